//! netflow-classify: preprocessing pipeline for flow-based traffic
//! classification experiments.
//!
//! # Pipeline
//!
//! ```text
//! ┌─────────┐    ┌─────────┐    ┌───────────┐    ┌────────────┐    ┌────────┐
//! │  flows  │───>│  label  │───>│  augment  │───>│ partition  │···>│ report │
//! │  (csv)  │    │ app→cls │    │  (BLINC)  │    │ train/test │    │  (CI)  │
//! └─────────┘    └─────────┘    └───────────┘    └────────────┘    └────────┘
//! ```
//!
//! - **label**: maps nDPI application tags to coarse classes ([`labels`])
//! - **augment**: per-source-address distinct counts ([`features`])
//! - **partition**: stratified train / k-way test split and standardization
//!   ([`partition`], [`scaling`])
//! - **report**: aggregates classifier results over the feature subset
//!   catalog ([`subsets`], [`report`])
//!
//! Classifier training happens outside this crate, between partition and
//! report.

pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod features;
pub mod labels;
pub mod partition;
pub mod report;
pub mod scaling;
pub mod subsets;
