pub mod ast;
pub mod error;
pub mod identifier;
pub mod json;
pub mod literal;
pub mod math;
pub mod opengex;
pub mod parser;
pub mod resource;
pub mod scanner;
pub mod scene;
pub mod token;

use ast::Document;
use error::{DdlError, ImportError};
use parser::Vocabulary;
use scene::{Scene, SceneGraph};

pub use opengex::{Axis, ImportOptions, Metrics};

// ── Core API ───────────────────────────────────────────────────────

/// Parse OpenGEX source: every identifier must be an OpenGEX structure name.
pub fn parse_ddl(input: &[u8]) -> Result<Document, DdlError> {
    parser::parse(input, Vocabulary::OpenGex)
}

/// Parse any OpenDDL source; unknown identifiers are kept by keyword.
pub fn parse_ddl_generic(input: &[u8]) -> Result<Document, DdlError> {
    parser::parse(input, Vocabulary::Generic)
}

/// The result of importing an OpenGEX file.
pub struct ImportResult<S> {
    pub scene: S,
    /// Units and axes declared by the file's `Metric` structures.
    pub metrics: Metrics,
    pub errors: Vec<ImportError>,
}

/// Import OpenGEX source into a fresh in-memory [`Scene`], returning the
/// scene and any errors (a parse error, or every non-fatal structure error).
pub fn import_opengex(input: &[u8], options: &ImportOptions) -> ImportResult<Scene> {
    import_opengex_into(input, Scene::new(), options)
}

/// Import OpenGEX source into an existing scene graph.
///
/// A parse error leaves `scene` untouched and is the only error returned.
pub fn import_opengex_into<S: SceneGraph>(
    input: &[u8],
    scene: S,
    options: &ImportOptions,
) -> ImportResult<S> {
    match parse_ddl(input) {
        Ok(document) => {
            let (scene, metrics, errors) = opengex::interpret(&document, scene, options);
            ImportResult {
                scene,
                metrics,
                errors,
            }
        }
        Err(err) => ImportResult {
            scene,
            metrics: Metrics::default(),
            errors: vec![ImportError::Parse(err)],
        },
    }
}
