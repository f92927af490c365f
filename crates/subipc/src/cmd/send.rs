use std::fs;
use std::time::Duration;

use subipc_serial::Value;

use crate::cmd::{attach, SendArgs};
use crate::exit::{channel_error, io_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_message, OutputFormat};

pub async fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let message = resolve_message(&args)?;
    let channel = attach()?;

    let result = if args.wait {
        match tokio::time::timeout(wait_timeout, channel.exchange_message(message)).await {
            Ok(Ok(reply)) => {
                print_message(1, &reply, format);
                Ok(SUCCESS)
            }
            Ok(Err(err)) => Err(channel_error("exchange failed", err)),
            Err(_) => Err(CliError::new(
                TIMEOUT,
                format!("no reply within {}", args.wait_timeout),
            )),
        }
    } else {
        channel
            .send_message(message)
            .await
            .map(|()| SUCCESS)
            .map_err(|err| channel_error("send failed", err))
    };

    channel.disconnect().await;
    result
}

fn resolve_message(args: &SendArgs) -> CliResult<Value> {
    let text = match (&args.json, &args.file) {
        (Some(json), _) => json.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?,
        (None, None) => return Err(CliError::new(USAGE, "--json or --file is required")),
    };
    let json: serde_json::Value = serde_json::from_str(&text)
        .map_err(|err| CliError::new(USAGE, format!("message is not valid JSON: {err}")))?;
    Ok(Value::from(json))
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(json: Option<&str>) -> SendArgs {
        SendArgs {
            json: json.map(str::to_string),
            file: None,
            wait: false,
            wait_timeout: "5s".into(),
        }
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
    }

    #[test]
    fn message_is_parsed_as_json() {
        let value = resolve_message(&args(Some(r#"{"n":[1,2]}"#))).unwrap();
        assert_eq!(
            value.get("n"),
            Some(Value::array([Value::from(1), Value::from(2)]))
        );
    }

    #[test]
    fn invalid_json_is_a_usage_error() {
        let err = resolve_message(&args(Some("{nope"))).unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
