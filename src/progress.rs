
//! Progress bar shown while candidate profiles are evaluated, using the `indicatif` crate.

use indicatif::{ProgressBar, ProgressStyle};

/// Create a progress bar over `len` candidates with a count of evaluated profiles.
pub fn progress_bar(len: u64) -> ProgressBar {
    let progress_bar = ProgressBar::new(len);
    progress_bar.set_style(ProgressStyle::default_bar().template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {percent}% [{human_pos}/{human_len} profiles] [Remaining: {eta}]",
    ).expect("Invalid progress style."));

    progress_bar
}
