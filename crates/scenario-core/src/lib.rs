//! # sippcap-scenario
//!
//! Turns SIP packets captured between two parties into a pair of SIPp
//! scenarios, one replaying the caller (UAC) and one the callee (UAS).
//!
//! The work happens in stages:
//!
//! 1. [`split`] classifies every packet relative to each role address and
//!    yields one ordered [`Event`] sequence per role.
//! 2. [`compile`] folds a sequence into scenario [`Action`]s, deciding which
//!    dialog state to capture from received messages and which to echo in
//!    sent ones.
//! 3. [`render`] turns each action into a `<send>`, `<recv>` or `<pause>`
//!    fragment using the per-method message templates.
//! 4. [`serialize`] wraps the fragments in a `<scenario>` document and checks
//!    it is well-formed.
//!
//! [`ScenarioGenerator`] runs the whole chain for both roles.
//!
//! ```no_run
//! use sippcap_capture::CaptureReader;
//! use sippcap_scenario::{GeneratorSettings, ScenarioGenerator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = GeneratorSettings {
//!     client: Some("10.0.0.1".into()),
//!     server: Some("10.0.0.2".into()),
//!     ..Default::default()
//! };
//! let packets = CaptureReader::open("call.pcap")?.packets()?;
//! let scenarios = ScenarioGenerator::new(settings).generate(&packets)?;
//! scenarios.write_to("scenarios")?;
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod catalog;
pub mod classifier;
pub mod compiler;
pub mod config;
pub mod error;
pub mod event;
pub mod formatter;
pub mod kind;
pub mod pipeline;
pub mod render;
pub mod sdp;
pub mod serializer;
pub mod splitter;
pub mod template;

pub use action::{Action, ActionKind, Binding, Role};
pub use classifier::{classify, RoleAddress};
pub use compiler::{compile, step, CompileOptions, CompilerState, RoutingProfile};
pub use config::GeneratorSettings;
pub use error::{Result, ScenarioError};
pub use event::{Direction, Event};
pub use formatter::{DocumentFormatter, XmlFormatter};
pub use kind::{MessageKind, RequestMethod, ResponseStatus};
pub use pipeline::{ScenarioGenerator, ScenarioPair};
pub use render::render;
pub use serializer::{serialize, ScenarioSerializer};
pub use splitter::{split, RoleEvents};
pub use template::{DialogContext, RenderContext, Template};
