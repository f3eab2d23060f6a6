// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # obd-knowledge
//!
//! Semantic fact management for an automotive on-board-diagnostics knowledge
//! graph kept in a remote SPARQL triple store.
//!
//! ## Architecture
//!
//! - **Facts** (`fact`): subject/predicate/object statements, the unit of mutation
//! - **Graph** (`graph`): connection over the SPARQL 1.1 protocol (`ureq`) or a
//!   local `oxigraph` store, with bounded retry for idempotent calls
//! - **Queries** (`query`): natural-key lookups and relation questions, decoded
//!   into typed rows
//! - **Enhancer** (`enhance`): per-entity upsert planning with referential
//!   integrity and prioritised suspect components
//! - **Replacer** (`replace`): retraction sets for confirmed overwrites, with
//!   reference counting for shared edges
//! - **Facade** (`kb`): single-writer entry point tying it all together
//!
//! ## Library usage
//!
//! ```no_run
//! use obd_knowledge::config::KbConfig;
//! use obd_knowledge::enhance::{ComponentRecord, TroubleCodeRecord};
//! use obd_knowledge::kb::KnowledgeBase;
//!
//! let kb = KnowledgeBase::new(KbConfig::default()).unwrap();
//! kb.publish_component(&ComponentRecord::new("Thermostat")).unwrap();
//!
//! let mut code = TroubleCodeRecord::new("P0128");
//! code.condition = Some("Coolant temperature below thermostat regulating temperature".into());
//! code.suspect_components = vec!["Thermostat".into()];
//! kb.publish_trouble_code(&code).unwrap();
//!
//! for row in kb.query().suspect_components("P0128").unwrap() {
//!     println!("{}. {}", row.priority, row.component_name);
//! }
//! ```

pub mod config;
pub mod enhance;
pub mod error;
pub mod export;
pub mod fact;
pub mod graph;
pub mod ident;
pub mod kb;
pub mod query;
pub mod replace;
pub mod vocab;
