//! Output generation: the Markdown briefing and the JSON archive.
//!
//! - [`markdown`]: renders a [`crate::models::Corpus`] per section into the
//!   daily briefing document, with numbered reference links collected at the
//!   bottom.
//! - [`archive`]: persists the structured corpus and the latest citation
//!   report as JSON under a date-partitioned archive directory.
//!
//! ```text
//! archive_dir/
//! ├── 2025-01-02/
//! │   └── briefing.json
//! └── citations_latest.json
//!
//! markdown_dir/
//! └── briefing_2025-01-02.md
//! ```

pub mod archive;
pub mod markdown;
