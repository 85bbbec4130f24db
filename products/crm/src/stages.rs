//! Fixed pipeline stage catalog.

use entity::deal::Stage;

use crate::error::{CrmError, CrmResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageMeta {
    pub stage: Stage,
    pub display_name: &'static str,
    pub sort_order: i16,
    pub probability: i16,
    pub color: &'static str,
    pub is_won: bool,
    pub is_lost: bool,
}

impl StageMeta {
    pub fn key(&self) -> &'static str {
        self.stage.key()
    }

    pub fn is_closed(&self) -> bool {
        self.is_won || self.is_lost
    }
}

/// Board order. Probabilities are the only values a deal in that stage may carry.
pub const STAGE_CATALOG: [StageMeta; 6] = [
    StageMeta {
        stage: Stage::Lead,
        display_name: "Lead",
        sort_order: 10,
        probability: 20,
        color: "gray",
        is_won: false,
        is_lost: false,
    },
    StageMeta {
        stage: Stage::Qualified,
        display_name: "Qualified",
        sort_order: 20,
        probability: 40,
        color: "info",
        is_won: false,
        is_lost: false,
    },
    StageMeta {
        stage: Stage::Proposal,
        display_name: "Proposal",
        sort_order: 30,
        probability: 60,
        color: "warning",
        is_won: false,
        is_lost: false,
    },
    StageMeta {
        stage: Stage::Negotiation,
        display_name: "Negotiation",
        sort_order: 40,
        probability: 80,
        color: "primary",
        is_won: false,
        is_lost: false,
    },
    StageMeta {
        stage: Stage::Won,
        display_name: "Won",
        sort_order: 90,
        probability: 100,
        color: "success",
        is_won: true,
        is_lost: false,
    },
    StageMeta {
        stage: Stage::Lost,
        display_name: "Lost",
        sort_order: 95,
        probability: 0,
        color: "danger",
        is_won: false,
        is_lost: true,
    },
];

pub fn stage_meta(stage: Stage) -> &'static StageMeta {
    STAGE_CATALOG
        .iter()
        .find(|meta| meta.stage == stage)
        .unwrap_or(&STAGE_CATALOG[0])
}

pub fn open_stages() -> impl Iterator<Item = &'static StageMeta> {
    STAGE_CATALOG.iter().filter(|meta| !meta.is_closed())
}

/// Case-insensitive lookup of a stage key such as `negotiation`.
pub fn parse_stage(raw: &str) -> CrmResult<Stage> {
    let key = raw.trim().to_lowercase();
    STAGE_CATALOG
        .iter()
        .find(|meta| meta.key() == key)
        .map(|meta| meta.stage)
        .ok_or_else(|| CrmError::InvalidStage(raw.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn catalog_covers_every_stage_once() {
        for stage in Stage::iter() {
            let hits = STAGE_CATALOG.iter().filter(|m| m.stage == stage).count();
            assert_eq!(hits, 1, "{stage:?}");
        }
    }

    #[test]
    fn probabilities_follow_the_pipeline() {
        let probs: Vec<i16> = STAGE_CATALOG.iter().map(|m| m.probability).collect();
        assert_eq!(probs, vec![20, 40, 60, 80, 100, 0]);
        assert!(stage_meta(Stage::Won).is_won);
        assert!(stage_meta(Stage::Lost).is_lost);
    }

    #[test]
    fn parse_accepts_known_keys_only() {
        assert_eq!(parse_stage(" Proposal ").unwrap(), Stage::Proposal);
        assert_eq!(parse_stage("won").unwrap(), Stage::Won);
        match parse_stage("closed") {
            Err(CrmError::InvalidStage(key)) => assert_eq!(key, "closed"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn open_stages_exclude_terminal_ones() {
        let keys: Vec<&str> = open_stages().map(StageMeta::key).collect();
        assert_eq!(keys, vec!["lead", "qualified", "proposal", "negotiation"]);
    }
}
