//! LaTeX rendering pipeline.
//!
//! A request flows through assembly (markup → standalone document), compilation
//! (document → PDF), extraction (PDF → SVG/PNG), and encoding (artifact → response
//! payload). Every render runs inside its own throwaway workspace.

pub mod compiler;
pub mod document;
pub mod encode;
pub mod error;
pub mod extract;
pub mod process;
mod service;
pub mod workspace;

pub use compiler::CompilerConfig;
pub use encode::{ImagePayload, RenderResponse};
pub use error::{ErrorKind, RenderError, RenderFailure, Stage};
pub use extract::{Artifact, ConverterConfig};
pub use service::{RenderPipelineConfig, RenderService, RenderedImage};
