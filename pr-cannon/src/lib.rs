#![doc = "pr-cannon: publish local files to a remote repository as a pull request."]

//! The binary crate is a thin shell: `cli` parses arguments and drives the
//! core pipeline, `github` implements the core's `GitHost` trait against the
//! GitHub REST API. All business logic lives in `pr-cannon-core`.

pub mod cli;
pub mod github;
