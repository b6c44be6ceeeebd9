//! Scripted chooser for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

use crate::choice::{ChoiceError, Chooser};

/// One pre-recorded answer.
#[derive(Debug, Clone)]
pub enum ScriptedAnswer {
    /// Pick the option at this index.
    Index(usize),
    /// Pick the option with this exact label, wherever it ends up.
    Label(String),
}

/// Chooser that replays a fixed sequence of answers.
///
/// Records every prompt it was shown; asking for more answers than were
/// scripted yields `ChoiceError::Closed`, like a user closing stdin.
#[derive(Debug, Default)]
pub struct ScriptedChooser {
    answers: Mutex<VecDeque<ScriptedAnswer>>,
    prompts: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedChooser {
    /// Chooser that answers with the given option indexes, in order.
    pub fn answering(indexes: impl IntoIterator<Item = usize>) -> Self {
        Self {
            answers: Mutex::new(indexes.into_iter().map(ScriptedAnswer::Index).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Chooser that answers by picking options with the given labels, in order.
    pub fn answering_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(
                labels
                    .into_iter()
                    .map(|l| ScriptedAnswer::Label(l.into()))
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every prompt shown so far, with the options that came with it.
    pub async fn prompts(&self) -> Vec<(String, Vec<String>)> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl Chooser for ScriptedChooser {
    async fn choose_one(&self, prompt: &str, options: &[String]) -> Result<usize, ChoiceError> {
        self.prompts
            .lock()
            .await
            .push((prompt.to_string(), options.to_vec()));

        let answer = self
            .answers
            .lock()
            .await
            .pop_front()
            .ok_or(ChoiceError::Closed)?;

        match answer {
            ScriptedAnswer::Index(index) => Ok(index),
            ScriptedAnswer::Label(label) => Ok(options
                .iter()
                .position(|o| o == &label)
                .unwrap_or_else(|| {
                    panic!("scripted label {:?} not among options {:?}", label, options)
                })),
        }
    }
}
