use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;

/// A progress bar on stderr, or `None` when there is nothing to show or
/// stderr is not a terminal.
pub fn progress_bar(len: u64, msg: String) -> Option<ProgressBar> {
    if len == 0 || !std::io::stderr().is_terminal() {
        return None;
    }

    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise} / {eta_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
        .map(|s| s.progress_chars("##-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());

    let bar = ProgressBar::new(len);
    bar.set_style(style);
    bar.set_message(msg);

    Some(bar)
}
