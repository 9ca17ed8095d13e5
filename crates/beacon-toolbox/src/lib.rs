//! Toolbox features and the registry that dispatches into them.
//!
//! A [`Feature`] is an executable capability selected by a short trigger
//! prefix (`.s` shell, `.e` environment, `.j` joke, `.a` AES decrypt,
//! `.2` two-factor codes). Features share a uniform lifecycle: configuration
//! check, one-shot initialisation, live self test, and execution against a
//! [`Command`](beacon_types::Command).

pub mod aescrypt;
pub mod envinfo;
pub mod feature;
pub mod joke;
pub mod shell;
pub mod twofa;

pub use aescrypt::{AesDecrypt, AesDecryptConfig};
pub use envinfo::EnvInfo;
pub use feature::{
    Feature, FeatureSet, ToolboxConfig, AES_DECRYPT_TRIGGER, ENV_INFO_TRIGGER, JOKE_TRIGGER,
    SENSITIVE_TRIGGERS, SHELL_TRIGGER, TWO_FA_TRIGGER,
};
pub use joke::Joke;
pub use shell::{Shell, ShellConfig};
pub use twofa::{TwoFACodeGenerator, TwoFAConfig};
