//! Terminal progress bar fed by the session's progress callback.

use indicatif::{ProgressBar, ProgressStyle};
use resend_transfer::{ProgressCallback, SendProgress};

const TEMPLATE: &str =
    "{msg} [{elapsed_precise}] {bar:40.cyan/blue} {bytes:>10}/{total_bytes:10} {bytes_per_sec}";

/// Creates the bar, hidden when `quiet` is set.
pub fn bar(name: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let style = ProgressStyle::with_template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    let pb = ProgressBar::new(0);
    pb.set_style(style);
    pb.set_message(name.to_owned());
    pb
}

/// Adapts a bar to the session's progress callback.
pub fn callback(pb: ProgressBar) -> ProgressCallback {
    Box::new(move |p: SendProgress| {
        pb.set_length(p.total);
        pb.set_position(p.position);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_tracks_position_and_total() {
        let pb = bar("file.bin", true);
        let cb = callback(pb.clone());

        cb(SendProgress {
            resumed_from: 10,
            position: 40,
            total: 100,
        });
        assert_eq!(pb.length(), Some(100));
        assert_eq!(pb.position(), 40);

        cb(SendProgress {
            resumed_from: 10,
            position: 100,
            total: 100,
        });
        assert_eq!(pb.position(), 100);
    }
}
