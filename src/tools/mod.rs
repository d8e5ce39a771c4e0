//! The subcommands of `ioccc-tools`.

pub mod clear;
pub mod delete;
pub mod gen_autocompletion;
pub mod info;
pub mod opt;
pub mod post_collect;
pub mod provision;
pub mod register;
pub mod set_status;
