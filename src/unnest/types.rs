use crate::error::UnnestError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Configuration for an extraction run
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Documents parsed and held in memory at once
    pub batch_size: usize,

    /// Fold registries from at most this many documents into the Players
    /// table (`None` = every document)
    pub registry_scan_limit: Option<usize>,

    /// Reserved tag for locally minted player ids
    pub synthetic_prefix: String,

    /// First value of the synthetic id counter
    pub synthetic_start: u64,

    /// File extension accepted by directory sources
    pub file_extension: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        ExtractConfig {
            batch_size: 500,
            registry_scan_limit: None,
            synthetic_prefix: String::from("SYNTH_"),
            synthetic_start: 1_000_000,
            file_extension: String::from("json"),
        }
    }
}

impl ExtractConfig {
    /// Reject settings that would corrupt identity resolution
    pub fn validate(&self) -> Result<(), UnnestError> {
        // Every registry id would count as reserved under an empty prefix
        if self.synthetic_prefix.is_empty() {
            return Err(UnnestError::InvalidConfig(
                "synthetic_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// `innings_id = match_id + "_" + ordinal`
pub fn innings_key(match_id: &str, ordinal: usize) -> String {
    format!("{}_{}", match_id, ordinal)
}

/// `over_id = innings_id + "_" + over_number`
pub fn over_key(innings_id: &str, over_number: i64) -> String {
    format!("{}_{}", innings_id, over_number)
}

/// `delivery_id = over_id + "_" + ball_number`
pub fn delivery_key(over_id: &str, ball_number: usize) -> String {
    format!("{}_{}", over_id, ball_number)
}

/// `dismissal_id = delivery_id + "_" + ordinal`
pub fn dismissal_key(delivery_id: &str, ordinal: usize) -> String {
    format!("{}_{}", delivery_id, ordinal)
}

/// Match date: parsed when the source string is a calendar date, otherwise
/// the raw string as given
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchDate {
    Parsed(NaiveDate),
    Raw(String),
}

impl MatchDate {
    pub fn parse(raw: &str) -> Self {
        match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => MatchDate::Parsed(date),
            Err(_) => MatchDate::Raw(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRow {
    pub match_id: String,
    pub date: Option<MatchDate>,
    pub city: Option<String>,
    pub venue: Option<String>,
    pub match_type: Option<String>,
    pub gender: Option<String>,
    pub season: Option<String>,
    pub match_event_name: Option<String>,
    pub match_event_id: Option<String>,
    pub match_number: Option<i64>,
    pub overs: Option<i64>,
    pub team1: Option<String>,
    pub team2: Option<String>,
    pub toss_winner: Option<String>,
    pub toss_decision: Option<String>,
    pub outcome_winner: Option<String>,
    pub outcome_by_runs: Option<i64>,
    pub outcome_by_wickets: Option<i64>,
    pub outcome_by_innings: Option<i64>,
    pub outcome_method: Option<String>,
    pub outcome_result: Option<String>,
    pub player_of_match: Option<String>,
    pub player_of_match_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InningsRow {
    pub innings_id: String,
    pub match_id: String,
    pub innings_number: usize,
    pub batting_team: Option<String>,
    pub bowling_team: Option<String>,
    pub powerplay_start_over: Option<f64>,
    pub powerplay_end_over: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverRow {
    pub over_id: String,
    pub innings_id: String,
    pub over_number: i64,
    pub total_runs: i64,
    pub wickets: i64,
    pub num_deliveries: usize,
    pub total_extras: i64,
    pub extras_wides: i64,
    pub extras_noballs: i64,
    pub extras_byes: i64,
    pub extras_legbyes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRow {
    pub delivery_id: String,
    pub over_id: String,
    pub innings_id: String,
    pub match_id: String,
    pub over_number: i64,
    pub ball_number: usize,
    pub batter: Option<String>,
    pub batter_id: Option<String>,
    pub bowler: Option<String>,
    pub bowler_id: Option<String>,
    pub non_striker: Option<String>,
    pub non_striker_id: Option<String>,
    pub batter_runs: i64,
    pub extras: i64,
    pub total_runs: i64,
    /// First extras category in document order
    pub extras_type: Option<String>,
    pub extras_value: i64,
    /// Number of extras categories on this ball; above 1 means `extras_type`
    /// only names the first
    pub extras_categories: usize,
    pub is_wicket: bool,
    pub wicket_player_out: Option<String>,
    pub wicket_player_out_id: Option<String>,
    pub wicket_kind: Option<String>,
    pub wicket_fielder: Option<String>,
    pub wicket_fielder_id: Option<String>,
}

/// One row per wicket sub-record, including the rare multi-dismissal balls
/// that the delivery row narrows to its first wicket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DismissalRow {
    pub dismissal_id: String,
    pub delivery_id: String,
    pub match_id: String,
    pub dismissal_number: usize,
    pub player_out: Option<String>,
    pub player_out_id: Option<String>,
    pub kind: Option<String>,
    pub fielders: Vec<Fielder>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fielder {
    pub name: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameVariant {
    pub name: String,
    pub occurrences: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRow {
    pub player_id: String,
    /// Most frequently observed name (first seen wins ties)
    pub player_name: String,
    /// Alternate names, most frequent first
    pub name_variations: Vec<NameVariant>,
    pub variant_count: usize,
    pub is_synthetic: bool,
}

/// The output tables of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Matches,
    Innings,
    Overs,
    Deliveries,
    Dismissals,
    Players,
}

impl TableKind {
    pub const ALL: [TableKind; 6] = [
        TableKind::Matches,
        TableKind::Innings,
        TableKind::Overs,
        TableKind::Deliveries,
        TableKind::Dismissals,
        TableKind::Players,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TableKind::Matches => "matches",
            TableKind::Innings => "innings",
            TableKind::Overs => "overs",
            TableKind::Deliveries => "deliveries",
            TableKind::Dismissals => "dismissals",
            TableKind::Players => "players",
        }
    }

    pub fn primary_key(self) -> &'static str {
        match self {
            TableKind::Matches => "match_id",
            TableKind::Innings => "innings_id",
            TableKind::Overs => "over_id",
            TableKind::Deliveries => "delivery_id",
            TableKind::Dismissals => "dismissal_id",
            TableKind::Players => "player_id",
        }
    }

    /// Index catalog created after each table is loaded
    pub fn indexes(self) -> &'static [&'static str] {
        match self {
            TableKind::Matches => &["match_id", "date", "match_type"],
            TableKind::Innings => &["innings_id", "match_id"],
            TableKind::Overs => &["over_id", "innings_id"],
            TableKind::Deliveries => &[
                "delivery_id",
                "over_id",
                "innings_id",
                "match_id",
                "batter_id",
                "bowler_id",
            ],
            TableKind::Dismissals => &["dismissal_id", "delivery_id"],
            TableKind::Players => &["player_id"],
        }
    }
}

/// Accumulated row-sets, one per table
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub matches: Vec<MatchRow>,
    pub innings: Vec<InningsRow>,
    pub overs: Vec<OverRow>,
    pub deliveries: Vec<DeliveryRow>,
    pub dismissals: Vec<DismissalRow>,
    pub players: Vec<PlayerRow>,
}

impl Tables {
    /// Append another batch's rows
    pub fn merge(&mut self, other: Tables) {
        self.matches.extend(other.matches);
        self.innings.extend(other.innings);
        self.overs.extend(other.overs);
        self.deliveries.extend(other.deliveries);
        self.dismissals.extend(other.dismissals);
        self.players.extend(other.players);
    }

    pub fn row_count(&self, kind: TableKind) -> usize {
        match kind {
            TableKind::Matches => self.matches.len(),
            TableKind::Innings => self.innings.len(),
            TableKind::Overs => self.overs.len(),
            TableKind::Deliveries => self.deliveries.len(),
            TableKind::Dismissals => self.dismissals.len(),
            TableKind::Players => self.players.len(),
        }
    }
}
