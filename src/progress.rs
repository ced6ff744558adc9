//! Progress tracking module for archive processing.
//!
//! Stage names, the progress callback used by the library and the
//! per-run summary printed by the CLI.

use std::fmt;

/// Processing stages for one archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingStage {
    /// Initializing
    #[default]
    Initializing,
    /// Reading the archive's member list
    Listing,
    /// Decoding selected pages
    Extracting,
    /// Resizing pages
    Resizing,
    /// Rotating pages
    Rotating,
    /// Combining pages
    Combining,
    /// Writing page images
    Saving,
    /// Completed
    Completed,
}

impl ProcessingStage {
    /// Get the name of the stage
    pub fn name(&self) -> &'static str {
        match self {
            ProcessingStage::Initializing => "Initializing",
            ProcessingStage::Listing => "Listing",
            ProcessingStage::Extracting => "Extracting",
            ProcessingStage::Resizing => "Resizing",
            ProcessingStage::Rotating => "Rotating",
            ProcessingStage::Combining => "Combining",
            ProcessingStage::Saving => "Saving",
            ProcessingStage::Completed => "Completed",
        }
    }

    /// Short description shown next to the stage name
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::Initializing => "preparing",
            ProcessingStage::Listing => "reading archive contents",
            ProcessingStage::Extracting => "decoding pages",
            ProcessingStage::Resizing => "changing page sizes",
            ProcessingStage::Rotating => "turning pages",
            ProcessingStage::Combining => "merging pages",
            ProcessingStage::Saving => "writing images",
            ProcessingStage::Completed => "done",
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.description())
    }
}

// ============ Progress Callback ============

/// Progress notifications emitted while an archive is processed
pub trait ProgressCallback: Send + Sync {
    /// Called when a new step starts
    fn on_step_start(&self, step: &str);
    /// Called to report progress within a step
    fn on_step_progress(&self, current: usize, total: usize);
    /// Called when a step completes
    fn on_step_complete(&self, step: &str, message: &str);
    /// Called for debug/verbose messages
    fn on_debug(&self, message: &str);
}

/// No-op progress callback (silent mode)
pub struct SilentProgress;

impl ProgressCallback for SilentProgress {
    fn on_step_start(&self, _step: &str) {}
    fn on_step_progress(&self, _current: usize, _total: usize) {}
    fn on_step_complete(&self, _step: &str, _message: &str) {}
    fn on_debug(&self, _message: &str) {}
}

// ============ Run Summary ============

/// Per-run totals printed at the end
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub archives: usize,
    pub pages_extracted: usize,
    pub pages_saved: usize,
    pub pages_skipped: usize,
    pub save_errors: usize,
    pub edit_errors: usize,
}

impl RunSummary {
    /// Page operations that failed during edit or save
    pub fn failed_pages(&self) -> usize {
        self.save_errors + self.edit_errors
    }

    /// Summary block shown after a run
    pub fn render(&self) -> String {
        let rule = "=".repeat(80);
        let mut out = String::new();
        out.push_str(&format!("\n{}\nProcessing Summary\n{}\n", rule, rule));
        out.push_str(&format!("  Archives:            {}\n", self.archives));
        out.push_str(&format!("  Pages extracted:     {}\n", self.pages_extracted));
        out.push_str(&format!("  Pages saved:         {}\n", self.pages_saved));
        out.push_str(&format!("  Skipped (existing):  {}\n", self.pages_skipped));
        out.push_str(&format!("  Save errors:         {}\n", self.save_errors));
        out.push_str(&format!("  Edit errors:         {}\n", self.edit_errors));
        out.push_str(&rule);
        out.push('\n');
        out
    }

    /// Print the summary block to stdout
    pub fn print(&self) {
        println!("{}", self.render());
    }
}
