use subipc_channel::Channel;

use crate::cmd::{attach, install_ctrlc_handler, EchoArgs};
use crate::exit::{channel_error, CliResult, SUCCESS};

pub async fn run(args: EchoArgs) -> CliResult<i32> {
    let channel = attach()?;
    let stop = install_ctrlc_handler()?;

    let result = tokio::select! {
        result = echo_all(&channel, args.count) => result,
        _ = stop.notified() => {
            tracing::info!("interrupted");
            Ok(0)
        }
    };
    channel.disconnect().await;

    let echoed = result?;
    tracing::info!(echoed, "echo finished");
    Ok(SUCCESS)
}

/// Echo messages until the parent disconnects or `limit` is reached.
async fn echo_all(channel: &Channel, limit: Option<usize>) -> CliResult<usize> {
    let mut messages = channel
        .get_each_message()
        .map_err(|err| channel_error("receive failed", err))?;

    let mut echoed = 0usize;
    while let Some(message) = messages.next_message().await {
        let message = message.map_err(|err| channel_error("receive failed", err))?;
        tracing::debug!(kind = message.kind(), "echoing message");
        channel
            .send_message(message)
            .await
            .map_err(|err| channel_error("echo send failed", err))?;

        echoed = echoed.saturating_add(1);
        if limit.is_some_and(|limit| echoed >= limit) {
            break;
        }
    }
    Ok(echoed)
}

#[cfg(test)]
mod tests {
    use subipc_channel::{ChannelConfig, Side};
    use subipc_serial::{Profile, Value};

    use super::*;

    fn pair() -> (Channel, Channel) {
        let (near, far) = tokio::io::duplex(16 * 1024);
        let parent = Channel::open(near, ChannelConfig::enabled());
        let child = Channel::open(
            far,
            ChannelConfig::enabled()
                .with_serialization(Profile::Advanced)
                .with_side(Side::Subprocess),
        );
        (parent, child)
    }

    #[tokio::test]
    async fn echoes_until_limit() {
        let (parent, child) = pair();
        let echo = tokio::spawn(async move { echo_all(&child, Some(2)).await });

        for text in ["one", "two"] {
            let reply = parent.exchange_message(text).await.unwrap();
            assert_eq!(reply, Value::from(text));
        }
        assert_eq!(echo.await.unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn stops_when_parent_disconnects() {
        let (parent, child) = pair();
        let echo = tokio::spawn(async move { echo_all(&child, None).await });

        parent.send_message(1).await.unwrap();
        assert_eq!(parent.get_one_message().await.unwrap(), Value::from(1));
        parent.disconnect().await;

        assert_eq!(echo.await.unwrap().unwrap(), 1);
    }
}
