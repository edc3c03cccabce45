//! Row extraction for the per-match tables
//!
//! Matches and deliveries resolve player names and go through
//! `TableExtractor`; innings and overs need no resolver and are free
//! functions. Two narrowing rules apply to the delivery row: `extras_type`
//! holds the first extras category in document key order (with
//! `extras_categories` counting all of them), and the `wicket_*` columns
//! hold the first wicket and its first fielder. Every wicket lands in the
//! dismissals table.
//!
//! Keys come from over numbers as written, so two overs sharing a number in
//! one innings produce colliding over and delivery ids. Both are emitted
//! here; `persist` keeps the first and reports how many it dropped.

use crate::unnest::accessor::Field;
use crate::unnest::reader::Document;
use crate::unnest::resolver::{PlayerResolver, Registry};
use crate::unnest::types::{
    delivery_key, dismissal_key, innings_key, over_key, DeliveryRow, DismissalRow, Fielder,
    InningsRow, MatchDate, MatchRow, OverRow, Tables,
};
use tracing::{debug, warn};

/// Extras categories decomposed into over totals
const EXTRAS_CATEGORIES: [&str; 4] = ["wides", "noballs", "byes", "legbyes"];

/// Turns parsed match documents into flat rows, resolving players as it goes
pub struct TableExtractor<'r> {
    resolver: &'r mut PlayerResolver,
}

impl<'r> TableExtractor<'r> {
    pub fn new(resolver: &'r mut PlayerResolver) -> Self {
        TableExtractor { resolver }
    }

    /// Extract every per-match table for a batch, in dependency order.
    /// The Players table is materialized separately from the resolver.
    pub fn extract_batch(&mut self, documents: &[Document]) -> Tables {
        let matches = self.matches(documents);
        let innings = innings(documents);
        let overs = overs(documents);
        let (deliveries, dismissals) = self.deliveries(documents);

        Tables {
            matches,
            innings,
            overs,
            deliveries,
            dismissals,
            players: Vec::new(),
        }
    }

    /// One row per document
    pub fn matches(&mut self, documents: &[Document]) -> Vec<MatchRow> {
        documents.iter().map(|doc| self.match_row(doc)).collect()
    }

    fn match_row(&mut self, doc: &Document) -> MatchRow {
        let info = doc.info();
        let registry = self.resolver.registry(doc.people());

        let event = info.key("event");
        let (match_event_name, match_event_id, match_number) = if event.object().is_some() {
            (
                event.key("name").text(),
                event.key("group").text(),
                event.key("match_number").i64(),
            )
        } else {
            (event.text(), None, None)
        };

        let player_of_match = info.at("player_of_match[0]").str();
        let player_of_match_id = self.resolver.resolve_opt(player_of_match, &registry);

        let outcome = info.key("outcome");

        MatchRow {
            match_id: doc.match_id.clone(),
            date: info.at("dates[0]").text().map(|raw| MatchDate::parse(&raw)),
            city: info.key("city").text(),
            venue: info.key("venue").text(),
            match_type: info.key("match_type").text(),
            gender: info.key("gender").text(),
            season: info.key("season").text(),
            match_event_name,
            match_event_id,
            match_number,
            overs: info.key("overs").i64(),
            team1: info.at("teams[0]").text(),
            team2: info.at("teams[1]").text(),
            toss_winner: info.at("toss.winner").text(),
            toss_decision: info.at("toss.decision").text(),
            outcome_winner: outcome.key("winner").text(),
            outcome_by_runs: outcome.at("by.runs").i64(),
            outcome_by_wickets: outcome.at("by.wickets").i64(),
            outcome_by_innings: outcome.at("by.innings").i64(),
            outcome_method: outcome.key("method").text(),
            outcome_result: outcome.key("result").text(),
            player_of_match: player_of_match.map(str::to_string),
            player_of_match_id,
        }
    }

    /// Delivery rows plus one dismissal row per wicket sub-record
    pub fn deliveries(&mut self, documents: &[Document]) -> (Vec<DeliveryRow>, Vec<DismissalRow>) {
        let mut deliveries = Vec::new();
        let mut dismissals = Vec::new();

        for doc in documents {
            let registry = self.resolver.registry(doc.people());

            for (innings_id, inning) in innings_with_ids(doc) {
                for (over_number, over) in overs_of(inning) {
                    let over_id = over_key(&innings_id, over_number);

                    for (idx, delivery) in over.key("deliveries").items().enumerate() {
                        let ball_number = idx + 1;
                        let delivery_id = delivery_key(&over_id, ball_number);

                        let batter = delivery.key("batter").str();
                        let bowler = delivery.key("bowler").str();
                        let non_striker = delivery.key("non_striker").str();
                        let batter_id = self.resolver.resolve_opt(batter, &registry);
                        let bowler_id = self.resolver.resolve_opt(bowler, &registry);
                        let non_striker_id = self.resolver.resolve_opt(non_striker, &registry);

                        let runs = delivery.key("runs");
                        let (extras_type, extras_value, extras_categories) =
                            first_extra(delivery.key("extras"));

                        let first_dismissal = dismissals.len();
                        for (n, wicket) in delivery.key("wickets").items().enumerate() {
                            dismissals.push(self.dismissal_row(
                                wicket,
                                &delivery_id,
                                &doc.match_id,
                                n + 1,
                                &registry,
                            ));
                        }
                        let first: Option<&DismissalRow> = dismissals.get(first_dismissal);
                        let first_fielder = first.and_then(|d| d.fielders.first());

                        deliveries.push(DeliveryRow {
                            delivery_id,
                            over_id: over_id.clone(),
                            innings_id: innings_id.clone(),
                            match_id: doc.match_id.clone(),
                            over_number,
                            ball_number,
                            batter: batter.map(str::to_string),
                            batter_id,
                            bowler: bowler.map(str::to_string),
                            bowler_id,
                            non_striker: non_striker.map(str::to_string),
                            non_striker_id,
                            batter_runs: runs.key("batter").i64_or(0),
                            extras: runs.key("extras").i64_or(0),
                            total_runs: runs.key("total").i64_or(0),
                            extras_type,
                            extras_value,
                            extras_categories,
                            is_wicket: first.is_some(),
                            wicket_player_out: first.and_then(|d| d.player_out.clone()),
                            wicket_player_out_id: first.and_then(|d| d.player_out_id.clone()),
                            wicket_kind: first.and_then(|d| d.kind.clone()),
                            wicket_fielder: first_fielder.and_then(|f| f.name.clone()),
                            wicket_fielder_id: first_fielder.and_then(|f| f.id.clone()),
                        });
                    }
                }
            }
        }

        (deliveries, dismissals)
    }

    fn dismissal_row(
        &mut self,
        wicket: Field<'_>,
        delivery_id: &str,
        match_id: &str,
        dismissal_number: usize,
        registry: &Registry,
    ) -> DismissalRow {
        let player_out = wicket.key("player_out").str();
        let player_out_id = self.resolver.resolve_opt(player_out, registry);

        let fielders = wicket
            .key("fielders")
            .items()
            .map(|fielder| {
                let name = fielder.key("name").str();
                Fielder {
                    id: self.resolver.resolve_opt(name, registry),
                    name: name.map(str::to_string),
                }
            })
            .collect();

        DismissalRow {
            dismissal_id: dismissal_key(delivery_id, dismissal_number),
            delivery_id: delivery_id.to_string(),
            match_id: match_id.to_string(),
            dismissal_number,
            player_out: player_out.map(str::to_string),
            player_out_id,
            kind: wicket.key("kind").text(),
            fielders,
        }
    }
}

/// One row per innings, including innings without ball-by-ball detail
pub fn innings(documents: &[Document]) -> Vec<InningsRow> {
    let mut rows = Vec::new();

    for doc in documents {
        let teams = doc.info().key("teams");

        for (idx, (innings_id, inning)) in innings_with_ids(doc).enumerate() {
            let batting_team = inning.key("team").text();
            let bowling_team = bowling_team(teams, batting_team.as_deref());

            let mut powerplay_start_over = None;
            let mut powerplay_end_over = None;
            for powerplay in inning.key("powerplays").items() {
                if powerplay.key("type").str() == Some("mandatory") {
                    powerplay_start_over = powerplay.key("from").f64();
                    powerplay_end_over = powerplay.key("to").f64();
                }
            }

            rows.push(InningsRow {
                innings_id,
                match_id: doc.match_id.clone(),
                innings_number: idx + 1,
                batting_team,
                bowling_team,
                powerplay_start_over,
                powerplay_end_over,
            });
        }
    }

    rows
}

/// Per-over totals with extras broken down by category
pub fn overs(documents: &[Document]) -> Vec<OverRow> {
    let mut rows = Vec::new();

    for doc in documents {
        for (innings_id, inning) in innings_with_ids(doc) {
            if !inning.key("overs").is_present() {
                warn!(match_id = %doc.match_id, innings_id = %innings_id, "innings has no ball-by-ball data");
                continue;
            }

            for (over_number, over) in overs_of(inning) {
                let deliveries = over.key("deliveries").array();

                let mut row = OverRow {
                    over_id: over_key(&innings_id, over_number),
                    innings_id: innings_id.clone(),
                    over_number,
                    total_runs: 0,
                    wickets: 0,
                    num_deliveries: deliveries.len(),
                    total_extras: 0,
                    extras_wides: 0,
                    extras_noballs: 0,
                    extras_byes: 0,
                    extras_legbyes: 0,
                };

                for delivery in deliveries.iter().map(Field::new) {
                    row.total_runs += delivery.at("runs.total").i64_or(0);
                    if !delivery.key("wickets").array().is_empty() {
                        row.wickets += 1;
                    }

                    let extras = delivery.key("extras");
                    if !extras.is_present() {
                        continue;
                    }
                    row.total_extras += delivery.at("runs.extras").i64_or(0);
                    row.extras_wides += extras.key("wides").i64_or(0);
                    row.extras_noballs += extras.key("noballs").i64_or(0);
                    row.extras_byes += extras.key("byes").i64_or(0);
                    row.extras_legbyes += extras.key("legbyes").i64_or(0);
                }

                rows.push(row);
            }
        }
    }

    rows
}

/// Innings fields paired with their composite keys, 1-based in document order
fn innings_with_ids(doc: &Document) -> impl Iterator<Item = (String, Field<'_>)> {
    doc.root()
        .key("innings")
        .items()
        .enumerate()
        .map(move |(idx, inning)| (innings_key(&doc.match_id, idx + 1), inning))
}

/// Overs of an innings that declare an over number; others are dropped
fn overs_of(inning: Field<'_>) -> impl Iterator<Item = (i64, Field<'_>)> {
    inning.key("overs").items().filter_map(|over| match over.key("over").i64() {
        Some(number) => Some((number, over)),
        None => {
            debug!("skipping over without an over number");
            None
        }
    })
}

/// The declared team that is not batting, when exactly one such team exists
fn bowling_team(teams: Field<'_>, batting: Option<&str>) -> Option<String> {
    let batting = batting?;
    let declared: Vec<&str> = teams.items().filter_map(|team| team.str()).collect();
    if !declared.contains(&batting) {
        return None;
    }

    let mut others = declared.into_iter().filter(|team| *team != batting);
    match (others.next(), others.next()) {
        (Some(team), None) => Some(team.to_string()),
        _ => None,
    }
}

/// First extras category in document order, its value, and how many
/// categories the ball carries
fn first_extra(extras: Field<'_>) -> (Option<String>, i64, usize) {
    let categories = extras.entries().count();
    match extras.entries().next() {
        Some((kind, value)) => {
            if !EXTRAS_CATEGORIES.contains(&kind) {
                debug!(extras_kind = %kind, "unrecognised extras category");
            }
            (Some(kind.to_string()), value.i64_or(0), categories)
        }
        None => (None, 0, 0),
    }
}
