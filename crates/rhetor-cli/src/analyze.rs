//! `rhetor analyze`

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use rhetor_core::tools::informal_registry_with;
use rhetor_core::{
    write_reports, AgentId, AnalysisConfig, CoherenceAnalyzer, HttpLogicSolver, LlmAgent, LlmConfig,
    OpenAiCompatibleClient, Orchestrator,
};
use rhetor_crypto::SecretString;
use rhetor_sources::{SourceFetcher, SourceStore, TextCache};
use tokio_util::sync::CancellationToken;

use crate::{AnalyzeArgs, InputArgs};

/// Resolve the input text and a label for the report
async fn load_text(
    config: &AnalysisConfig,
    input: &InputArgs,
    passphrase: Option<&SecretString>,
    http: reqwest::Client,
) -> anyhow::Result<(String, Option<String>)> {
    if let Some(text) = &input.text {
        return Ok((text.clone(), None));
    }
    if let Some(path) = &input.file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("cannot read {}", path.display()))?;
        return Ok((text, Some(path.display().to_string())));
    }
    let Some(id) = &input.source else {
        bail!("one of --source, --text or --file is required");
    };
    let store = SourceStore::load_or_default(&config.sources_path(), passphrase);
    let fetcher = SourceFetcher::new(TextCache::open(config.cache_dir()).await?, http);
    let text = fetcher.fetch(&store, id).await?;
    Ok((text, Some(id.clone())))
}

pub async fn run(
    mut config: AnalysisConfig,
    args: AnalyzeArgs,
    passphrase: Option<&SecretString>,
) -> anyhow::Result<()> {
    if let Some(max_turns) = args.max_turns {
        config.max_turns = max_turns;
    }
    if let Some(agent) = args.first_agent {
        config.first_agent = agent.into();
    }
    config.validate()?;

    let http = OpenAiCompatibleClient::default_http(Duration::from_secs(config.request_timeout_secs))?;
    let (text, source) = load_text(&config, &args.input, passphrase, http.clone()).await?;

    let api_key = AnalysisConfig::api_key_from_env()
        .with_context(|| format!("{} is not set", rhetor_core::config::API_KEY_ENV))?;
    let client = Arc::new(OpenAiCompatibleClient::new(
        LlmConfig {
            api_key,
            model: config.model.clone(),
            api_url: config.api_url.clone(),
            temperature: config.temperature,
        },
        http.clone(),
    ));

    let coherence = CoherenceAnalyzer::new(config.coherence.clone());
    let informal = LlmAgent::new(AgentId::InformalFallacy, client.clone(), informal_registry_with(coherence)?)
        .with_max_tool_rounds(config.max_tool_rounds);
    let logic = LlmAgent::logic(client)?.with_max_tool_rounds(config.max_tool_rounds);
    let mut orchestrator = Orchestrator::new(Box::new(informal), Box::new(logic))
        .with_config(&config)
        .with_taxonomy(Arc::new(crate::load_taxonomy(&config)?));
    match &config.solver_url {
        Some(url) => {
            orchestrator = orchestrator.with_solver(Arc::new(HttpLogicSolver::new(url.clone(), http)));
        }
        None => tracing::warn!("no solver_url configured, logic queries will be unavailable"),
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current turn");
            on_interrupt.cancel();
        }
    });

    println!(
        "Analysing with {} (max {} turns, {} first)...",
        config.model,
        orchestrator.max_turns(),
        config.first_agent
    );
    let outcome = orchestrator.run(&text, &cancel).await;
    let paths = write_reports(&outcome, source.as_deref(), &config.report_dir()).await?;

    println!();
    println!("Run:        {}", outcome.run_id);
    println!("Result:     {}", outcome.reason);
    println!("Turns:      {}", outcome.turns());
    println!("Arguments:  {}", outcome.state.arguments().len());
    println!("Fallacies:  {}", outcome.state.fallacies().len());
    for f in outcome.state.fallacies() {
        println!("  - {} ({:.2})", f.fallacy_type, f.confidence);
    }
    println!("Logic:      {} result(s)", outcome.state.logic_results().len());
    if let Some(conclusion) = outcome.state.conclusion() {
        println!("Conclusion: {}", conclusion);
    }
    println!();
    println!("Report:     {}", paths.markdown.display());
    println!("JSON:       {}", paths.json.display());
    println!("Transcript: {}", paths.transcript.display());

    if outcome.reason.is_error() {
        bail!("analysis ended with an error: {}", outcome.reason);
    }
    Ok(())
}
