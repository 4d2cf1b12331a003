//! Read-only queries over the project's store. A missing store answers with
//! empty results instead of creating one.

use crate::host::{Host, HostEnv};
use mindtrail_store::{list_backups, MemoryStore, SearchMode, SearchOptions, TimelineOptions};
use serde_json::{json, Value};

fn host_for_cwd(env: &HostEnv) -> anyhow::Result<Host> {
    Ok(Host::new(env.clone(), &std::env::current_dir()?))
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn search(env: &HostEnv, query: &str, k: usize, mode: SearchMode) -> anyhow::Result<()> {
    let mut host = host_for_cwd(env)?;
    print_json(&search_json(&mut host, query, SearchOptions { k, mode })?)
}

pub fn ask(env: &HostEnv, question: &str, k: usize) -> anyhow::Result<()> {
    let mut host = host_for_cwd(env)?;
    print_json(&ask_json(&mut host, question, k)?)
}

pub fn stats(env: &HostEnv) -> anyhow::Result<()> {
    let mut host = host_for_cwd(env)?;
    print_json(&stats_json(&mut host)?)
}

pub fn timeline(env: &HostEnv, limit: usize, oldest_first: bool) -> anyhow::Result<()> {
    let mut host = host_for_cwd(env)?;
    print_json(&timeline_json(&mut host, limit, oldest_first)?)
}

pub fn search_json(host: &mut Host, query: &str, options: SearchOptions) -> anyhow::Result<Value> {
    let hits = match host.memory.reader()? {
        Some(store) => store.search(query, options)?,
        None => Vec::new(),
    };
    Ok(json!({
        "query": query,
        "count": hits.len(),
        "hits": hits,
    }))
}

pub fn ask_json(host: &mut Host, question: &str, k: usize) -> anyhow::Result<Value> {
    let answer = match host.memory.reader()? {
        Some(store) => store.ask(
            question,
            SearchOptions {
                k,
                mode: SearchMode::Auto,
            },
        )?,
        None => Default::default(),
    };
    Ok(json!({
        "question": question,
        "answer": answer.answer,
        "sources": answer.sources,
    }))
}

pub fn stats_json(host: &mut Host) -> anyhow::Result<Value> {
    let store_file = host.paths.store_file();
    let stats = match host.memory.reader()? {
        Some(store) => store.stats()?,
        None => Default::default(),
    };
    Ok(json!({
        "path": store_file.display().to_string(),
        "frame_count": stats.frame_count,
        "size_bytes": stats.size_bytes,
        "backups": list_backups(&store_file).len(),
    }))
}

pub fn timeline_json(host: &mut Host, limit: usize, oldest_first: bool) -> anyhow::Result<Value> {
    let frames = match host.memory.reader()? {
        Some(store) => store.timeline(TimelineOptions {
            limit,
            reverse: !oldest_first,
        })?,
        None => Vec::new(),
    };
    Ok(json!({
        "count": frames.len(),
        "frames": frames,
    }))
}
