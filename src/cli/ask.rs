use anyhow::{Result, bail};

use super::AskArgs;
use crate::core::config::{self, RelayConfig};
use crate::core::jobs::{JobSettings, ResearchRequest};
use crate::core::relay::{PlainText, StdoutSink, relay};
use crate::core::terminal;
use crate::core::upstream::{ResponsesClient, Upstream};
use crate::logging;

pub(super) async fn run(args: AskArgs) -> Result<()> {
    logging::init_stderr("warn");

    if args.prompt.trim().is_empty() {
        bail!("ask needs --prompt \"<question>\"");
    }

    let config = RelayConfig::load(config::data_dir()?).await?;
    let settings = JobSettings::from_config(&config.jobs, &config.upstream.default_model)?;
    let client = ResponsesClient::new(
        &config.upstream.base_url,
        config.api_key(),
        config.connect_timeout(),
    )?;

    let request = ResearchRequest {
        query: args.prompt,
        model: args.model,
        tools: args.tools,
        ..Default::default()
    };
    let upstream_request = request.to_upstream(&settings, false)?;
    let source = client.stream(&upstream_request).await?;

    let mut sink = StdoutSink::new();
    let outcome = relay(source, &mut sink, &PlainText).await;

    if !outcome.content_sent {
        match outcome.errors.first() {
            Some(reason) => bail!("No answer received: {}", reason),
            None => terminal::print_warn("The stream ended without any content."),
        }
    }
    Ok(())
}
