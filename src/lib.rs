//! Profile-based job link manager.
//!
//! A profile is a directory holding a `jobs.txt` list of posting URLs and an
//! optional `search_specs.json`. The interactive session can fetch postings
//! from job boards, validate links in the background, open them as browser
//! tabs and build an AI search prompt.

pub mod app;
