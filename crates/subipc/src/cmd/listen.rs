use subipc_channel::Channel;

use crate::cmd::{attach, install_ctrlc_handler, ListenArgs};
use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub async fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let channel = attach()?;
    let stop = install_ctrlc_handler()?;

    let result = tokio::select! {
        result = print_all(&channel, args.count, format) => result,
        _ = stop.notified() => Ok(()),
    };
    channel.disconnect().await;

    result.map(|()| SUCCESS)
}

async fn print_all(
    channel: &Channel,
    count: Option<usize>,
    format: OutputFormat,
) -> CliResult<()> {
    let mut messages = channel
        .get_each_message()
        .map_err(|err| channel_error("receive failed", err))?;

    let mut printed = 0usize;
    while let Some(message) = messages.next_message().await {
        let message = message.map_err(|err| channel_error("receive failed", err))?;
        printed = printed.saturating_add(1);
        print_message(printed, &message, format);

        if count.is_some_and(|count| printed >= count) {
            break;
        }
    }
    tracing::debug!(printed, "listen finished");
    Ok(())
}
