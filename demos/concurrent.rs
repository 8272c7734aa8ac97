//! Concurrent Fan-out
//!
//! This example fans a word count out over several workers and joins the
//! partial counts before reducing them.
//!
//! Key concepts:
//! - Returning several successor states to fan out
//! - Concurrent branches sharing one context
//! - Duplicate successors merged at the join
//! - Bounding the worker pool with `EngineConfig`
//!
//! Run with: cargo run --example concurrent

use std::collections::HashMap;
use switchyard::logging::LoggingConfig;
use switchyard::{state_enum, Context, EngineConfig, StateMachine, TaskResult};

state_enum! {
    enum Phase {
        Split,
        MapHead,
        MapTail,
        Reduce,
        Complete,
    }
    start: Split
    done: Complete
}

const TEXT: &str = "the quick brown fox jumps over the lazy dog the end";

type Counts = HashMap<String, usize>;

fn count_words(ctx: &Context, chunk_key: &str) -> TaskResult<Phase> {
    let chunk: Vec<String> = ctx.get(chunk_key)?;
    let mut local = Counts::new();
    for word in chunk {
        *local.entry(word).or_default() += 1;
    }
    println!("  {chunk_key}: {} distinct words", local.len());

    ctx.update("partials", |partials: &mut Vec<Counts>| partials.push(local))?;
    Ok(Phase::Reduce.into())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    LoggingConfig::init()?;

    println!("=== Concurrent Fan-out Example ===\n");

    let config = EngineConfig::from_env()?.with_max_workers(2);
    let mut machine = StateMachine::new().named("wordcount").with_config(config);
    machine.context().insert("partials", Vec::<Counts>::new());

    machine
        .on(Phase::Split, |ctx: &Context| {
            let words: Vec<String> = TEXT.split_whitespace().map(str::to_string).collect();
            let (head, tail) = words.split_at(words.len() / 2);
            ctx.insert("head", head.to_vec());
            ctx.insert("tail", tail.to_vec());
            println!("Split {} words into two chunks", words.len());
            Ok([Phase::MapHead, Phase::MapTail].into())
        })?
        .on(Phase::MapHead, |ctx: &Context| count_words(ctx, "head"))?
        .on(Phase::MapTail, |ctx: &Context| count_words(ctx, "tail"))?
        .on(Phase::Reduce, |ctx: &Context| {
            let partials: Vec<Counts> = ctx.take("partials")?;
            let mut totals = Counts::new();
            for partial in partials {
                for (word, n) in partial {
                    *totals.entry(word).or_default() += n;
                }
            }
            let mut ranked: Vec<_> = totals.into_iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            println!("\nTop words:");
            for (word, n) in ranked.iter().take(3) {
                println!("  '{word}': {n}");
            }
            Ok(Phase::Complete.into())
        })?;

    let summary = machine.run()?;

    println!("\n=== Summary ===");
    println!("Generations: {}", summary.generations);
    println!("Handlers dispatched: {}", summary.dispatched);
    println!("Concurrent steps: {}", summary.history.concurrent_steps());
    Ok(())
}
