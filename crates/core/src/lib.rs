pub mod choice;
pub mod config;
pub mod consolidate;
pub mod fsmeta;
pub mod matcher;
pub mod priorities;
pub mod reconcile;
pub mod scan;
pub mod testing;
pub mod torrent_client;

pub use choice::{ChoiceError, Chooser};
pub use config::{load_config, load_config_from_str, validate_config, ClientConfig, Config, ConfigError};
pub use consolidate::{consolidate_paths, ConsolidateError, ConsolidationReport};
pub use fsmeta::{same_underlying_file, FsMeta, StdFsMeta, StorageId};
pub use matcher::{find_candidates, resolve_ambiguity, MatchContext, Resolution};
pub use priorities::{apply_priority_rules, PriorityReport, PriorityRule, RuleParseError};
pub use reconcile::{ReconcileError, ReconcileOptions, Reconciler, RunReport, TorrentReport};
pub use scan::{scan_candidates, DiskCandidate, HARDLINK_MIN_SIZE};
pub use torrent_client::{
    FilePriority, QBittorrentClient, TorrentClient, TorrentClientError, TorrentFileEntry,
    TorrentFilter, TorrentInfo,
};
