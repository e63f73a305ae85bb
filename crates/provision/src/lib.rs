//! # provision
//!
//! Idempotent provisioning of a secrets-bearing configuration file on a
//! deployment target.
//!
//! The configuration artifact is published once per deployment lineage into
//! the target's shared path. Every later deploy finds it there and does
//! nothing, so secrets chosen by an earlier run (or by a human) survive
//! redeploys instead of being regenerated.
//!
//! ## Core Concepts
//!
//! - **RenderContext**: resolved variables with their [`Origin`]; first writer wins
//! - **Resolver**: pre-set value, then extraction from the remote artifact, then prompt
//! - **KeySource**: external generator for the secret key block
//! - **Template**: `{{ name }}` placeholders rendered against a complete context
//! - **Provisioner**: the existence gate and the ordered pipeline
//!
//! ## Example
//!
//! ```no_run
//! use provision::{
//!     MemoryTarget, Provisioner, RemoteLayout, ScriptedInput, StaticKeySource, vars,
//! };
//!
//! let target = MemoryTarget::new().with_dir("/srv/app/shared");
//! let layout = RemoteLayout::new("/srv/app/shared", "/srv/app/current", "wp-config.php");
//!
//! let mut provisioner = Provisioner::new(
//!     Box::new(target.clone()),
//!     Box::new(StaticKeySource::new("define('AUTH_KEY', 'x');")),
//!     Box::new(ScriptedInput::new(["secret123"])),
//!     "blog",
//!     layout,
//! );
//! provisioner
//!     .preset(vars::DB_USERNAME, "bunny_prd")
//!     .preset(vars::DB_DATABASE, "blog_production")
//!     .preset(vars::DB_ADAPTER, "mysql")
//!     .preset(vars::DB_HOST, "localhost");
//!
//! let outcome = provisioner.provision(false)?;
//! println!("{outcome}");
//! # Ok::<(), provision::Error>(())
//! ```
//!
//! ## Capability Traits
//!
//! Side effects go through traits so the pipeline runs unchanged against a
//! real host, the local filesystem, or in-memory fakes:
//!
//! - [`RemoteTarget`]: probe, read, mkdir, atomic write, copy
//! - [`SecretInput`]: operator prompts
//! - [`KeySource`]: key block generator
//! - [`Hook`]: handlers around the password steps

pub mod error;
pub mod hooks;
pub mod input;
pub mod keys;
pub mod orchestrator;
pub mod render;
pub mod resolver;
pub mod target;
pub mod types;

pub use error::{Error, ProviderError, RemoteIoError, RenderError, ResolveError, Result};
pub use hooks::{CredentialHook, Hook, HookContext, Hooks, Phase, Step};
pub use input::{NonInteractive, ScriptedInput, SecretInput};
pub use keys::{DEFAULT_KEY_ENDPOINT, HttpKeySource, KeySource, StaticKeySource, obtain};
pub use orchestrator::{Preview, Provisioner};
pub use render::Template;
pub use resolver::{Extractor, Resolver};
pub use target::{LocalTarget, MemoryTarget, RemoteTarget};
pub use types::{
    ConfigVariable, Credential, Origin, Outcome, PromoteOutcome, RemoteConfigState, RemoteLayout,
    RenderContext, SecretKeySet, vars,
};
