use serde::Serialize;

use perfbench_domain::{MetricInfo, Task, render};
use perfbench_task_store::TaskPage;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn timestamp(millis: Option<u64>) -> String {
    millis.map_or_else(|| "-".to_string(), |m| m.to_string())
}

pub fn print_task(task: &Task) {
    println!("task {} ({})", task.id, task.state);
    println!("  model:     {}", task.model_name);
    println!("  dataset:   {}", task.dataset_name);
    println!(
        "  load:      {} requests at concurrency {}",
        task.config.total_requests, task.config.concurrency
    );
    println!("  created:   {}", task.created_at);
    println!("  started:   {}", timestamp(task.started_at));
    println!("  completed: {}", timestamp(task.completed_at));
    if let Some(message) = &task.error_message {
        println!("  error:     {message}");
    }
    if let Some(results) = &task.results {
        println!("\nsummary:");
        print_lines(&results.summary_results);
        println!("\npercentiles:");
        print_lines(&results.percentile_results);
    }
}

fn print_lines(text: &str) {
    for line in text.lines() {
        println!("  {line}");
    }
}

pub fn print_page(page: &TaskPage) {
    println!("{:>8}  {:<10}  {:<24}  {}", "ID", "STATE", "MODEL", "DATASET");
    for task in &page.tasks {
        println!(
            "{:>8}  {:<10}  {:<24}  {}",
            task.id.get(),
            task.state.as_str(),
            task.model_name,
            task.dataset_name
        );
    }
    println!("{} of {} tasks", page.tasks.len(), page.total);
}

pub fn print_metrics(heading: &str, metrics: &[MetricInfo]) {
    println!("{heading}:");
    for metric in metrics {
        println!("  {} ({})", metric.title, metric.key);
        println!("      {}", metric.description);
        if let Some(derivation) = metric.derivation {
            println!("      = {derivation}");
        }
    }
}

pub fn print_tables(parsed: &perfbench_domain::ParsedOutput) {
    println!("summary:");
    print_lines(&render::summary_to_text(&parsed.summary));
    println!("\npercentiles:");
    print_lines(&render::percentiles_to_text(&parsed.percentiles));
}
