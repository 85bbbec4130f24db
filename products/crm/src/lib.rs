//! Deal pipeline core: stage catalog, stage transitions, board aggregation and
//! revenue forecasting. Every operation takes the owning user explicitly.

pub mod board;
pub mod contacts;
pub mod deals;
pub mod error;
pub mod forecast;
pub mod stages;
pub mod transition;

pub use board::{BoardDeal, BoardOptions, PipelineBoard, PipelineColumn, build_board};
pub use deals::{DealChanges, NewDeal};
pub use error::{CrmError, CrmResult};
pub use stages::{STAGE_CATALOG, StageMeta, parse_stage, stage_meta};
pub use transition::{StageMove, move_to_stage, move_to_stage_key};
