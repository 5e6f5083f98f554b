use anyhow::Result;
use serde_json::{Map, Value};

use crate::args::BaseArgs;

pub fn run(base: BaseArgs, global: bool, local: bool, by_source: bool) -> Result<()> {
    if by_source {
        run_verbose(base, global, local)
    } else {
        run_resolved(base, global, local)
    }
}

fn run_resolved(base: BaseArgs, global: bool, local: bool) -> Result<()> {
    let config = if global {
        super::load_global()?
    } else if local {
        super::local_path()
            .map(|p| super::load_file(&p))
            .unwrap_or_default()
    } else {
        super::load()?
    };

    let output = format_resolved(&config, base.json)?;
    if !output.is_empty() {
        if base.json {
            // JSON goes to stdout so it can be piped.
            println!("{output}");
        } else {
            eprintln!("{output}");
        }
    }

    Ok(())
}

fn masked(fields: &[(&str, &str)]) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), super::display_value(k, v)))
        .collect()
}

fn format_resolved(config: &super::Config, json: bool) -> Result<String> {
    let fields = masked(&config.non_empty_fields());

    if json {
        let map: Map<String, Value> = fields
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Ok(serde_json::to_string(&map)?)
    } else {
        Ok(fields
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

fn run_verbose(base: BaseArgs, global: bool, local: bool) -> Result<()> {
    let global_path = super::global_path().ok();
    let local_path = super::local_path();

    let global_cfg = if !local {
        global_path
            .as_ref()
            .map(|p| (p.display().to_string(), super::load_file(p)))
    } else {
        None
    };

    let local_cfg = if !global {
        local_path.as_ref().map(|p| {
            let display_path = std::env::current_dir()
                .ok()
                .and_then(|cwd| pathdiff::diff_paths(p, &cwd))
                .unwrap_or_else(|| p.clone())
                .display()
                .to_string();
            (display_path, super::load_file(p))
        })
    } else {
        None
    };

    let sources: Vec<(String, Vec<(String, String)>)> = [global_cfg, local_cfg]
        .into_iter()
        .flatten()
        .map(|(path, cfg)| (path, masked(&cfg.non_empty_fields())))
        .filter(|(_, fields)| !fields.is_empty())
        .collect();

    let output = format_verbose(&sources, base.json)?;
    if !output.is_empty() {
        println!("{output}");
    }

    Ok(())
}

fn format_verbose(sources: &[(String, Vec<(String, String)>)], json: bool) -> Result<String> {
    if json {
        let mut map = Map::new();
        for (path, fields) in sources {
            let o: Map<String, Value> = fields
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            map.insert(path.clone(), Value::Object(o));
        }
        Ok(serde_json::to_string(&map)?)
    } else {
        let mut parts = Vec::new();
        for (path, fields) in sources {
            let mut group = String::from(path.as_str());
            for (key, value) in fields {
                group.push_str(&format!("\n  {key}: {value}"));
            }
            parts.push(group);
        }
        Ok(parts.join("\n\n"))
    }
}
