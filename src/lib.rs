//! # single-panels
//!
//! Cluster-resolved differential expression and gene set enrichment panel reports for
//! single-cell data, part of the single-rust ecosystem.
//!
//! This crate takes one pre-processed single-cell dataset, derives a second clustering of it
//! at a coarser resolution, and renders one multi-page PDF report with a four-quadrant figure
//! panel per (dataset variant, cluster) pair: cluster map, volcano plot, and two gene set
//! enrichment dot plots. It is optimized for sparse single-cell matrices (`CsrMatrix` from
//! nalgebra-sparse, cells × genes) and keeps the whole run deterministic: every randomised
//! step is driven by fixed seeds.
//!
//! ## Pipeline
//!
//! 1. **Dataset preparation** ([`dataset`], [`cluster`]): load the serialized dataset and
//!    derive the low-resolution variant (PCA, kNN graph, community detection, 2D layout).
//! 2. **Per-cluster analysis** ([`dea`], [`enrichment`]): cluster-vs-rest differential
//!    expression, ranked-list derivation, and preranked GSEA against two gene set
//!    collections.
//! 3. **Report emission** ([`plotting`], [`report`]): one 2x2 panel page per
//!    (variant, cluster) pair, appended to a single PDF in a fixed iteration order.
//!
//! The [`pipeline`] module ties the stages together; `src/bin/cluster_report.rs` runs them
//! against fixed relative paths.

pub mod cluster;
pub mod dataset;
pub mod dea;
pub mod enrichment;
pub mod pipeline;
pub mod plotting;
pub mod report;

pub(crate) mod rng;
