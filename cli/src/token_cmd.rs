//! `herbtrace token` subcommands.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use herbtrace_core::{ChainError, HerbtraceConfig, RecordId, RecordKind, TokenError, token};
use serde_json::json;

use crate::{print_json, render};

#[derive(Debug, Parser)]
pub struct TokenCli {
    #[command(subcommand)]
    pub command: TokenSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum TokenSubcommand {
    /// Show the record kind and id a token names.
    Decode(DecodeArgs),
    /// Mint the token for a known record id.
    Encode(EncodeArgs),
}

#[derive(Debug, Args)]
pub struct DecodeArgs {
    #[arg(value_name = "TOKEN")]
    pub token: String,
}

#[derive(Debug, Args)]
pub struct EncodeArgs {
    /// Record kind: collection, transport, processing or lab_test.
    #[arg(long = "kind", short = 'k', value_parser = parse_kind)]
    pub kind: RecordKind,

    /// Record id (UUID).
    #[arg(long = "id", short = 'i')]
    pub id: RecordId,
}

fn parse_kind(value: &str) -> Result<RecordKind, String> {
    RecordKind::parse(value).ok_or_else(|| {
        format!("unknown record kind `{value}` (expected collection, transport, processing or lab_test)")
    })
}

impl TokenCli {
    pub(crate) fn run(&self, config: &HerbtraceConfig, json: bool) -> anyhow::Result<()> {
        match &self.command {
            TokenSubcommand::Decode(args) => decode(args, json),
            TokenSubcommand::Encode(args) => encode(args, config, json),
        }
    }
}

/// Decoding needs no configuration: any namespace prefix is accepted.
pub(crate) fn decode(args: &DecodeArgs, json: bool) -> anyhow::Result<()> {
    let reference = token::decode(&args.token)
        .map_err(ChainError::from)
        .with_context(|| format!("decoding {}", args.token.trim()))?;

    if json {
        print_json(&json!({
            "kind": reference.kind,
            "id": reference.id,
        }))?;
    } else {
        print!(
            "{}",
            render::reference_text(reference, &herbtrace_core::TokenCodec::default())
        );
    }
    Ok(())
}

fn encode(args: &EncodeArgs, config: &HerbtraceConfig, json: bool) -> anyhow::Result<()> {
    if args.id.is_nil() {
        return Err(ChainError::from(TokenError::InvalidIdentifier {
            value: args.id.to_string(),
            reason: "nil identifier".to_string(),
        }))
        .context("encoding token");
    }

    let token = config.token.codec().encode(args.kind, &args.id);
    if json {
        print_json(&json!({
            "kind": args.kind,
            "id": args.id,
            "token": token,
        }))?;
    } else {
        println!("{token}");
    }
    Ok(())
}
