use rfd::{MessageButtons, MessageDialog, MessageLevel};

/// Logs `err`, blocks on an error dialog until the operator acknowledges it
/// and terminates with exit code 1.
pub fn report_and_exit(err: &anyhow::Error) -> ! {
    log::error!("{err:#}");
    MessageDialog::new()
        .set_level(MessageLevel::Error)
        .set_title("flickex")
        .set_description(format!("{err:#}"))
        .set_buttons(MessageButtons::Ok)
        .show();
    log::logger().flush();
    std::process::exit(1)
}
