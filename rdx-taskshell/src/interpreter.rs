//! The shell's command interpreter, kept apart from the line editor so it can be
//! driven from tests.

use anyhow::{anyhow, Result};
use colored::Colorize;
use std::time::Duration;
use taskflow::prelude::*;
use taskflow::time::seconds;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::Receiver;

pub struct Shell {
    scheduler: Scheduler,
    match_clock: ManualClock,
    events: Receiver<SchedulerEvent>,
    period: Duration,
}

impl Shell {
    pub fn new(config: &TaskflowConfig) -> Self {
        let match_clock = ManualClock::new();
        let scheduler = Scheduler::with_config(config).with_match_clock(match_clock.clone());
        let events = scheduler.subscribe_events();
        Self {
            scheduler,
            match_clock,
            events,
            period: config.resolution.tick_period(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    #[cfg(test)]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn execute(&mut self, args: &[&str]) -> Result<()> {
        match args {
            ["resource", name] => {
                if self.scheduler.resource_by_name(name).is_some() {
                    return Err(anyhow!("resource '{}' already exists", name));
                }
                self.scheduler.add_resource(*name);
                println!("--> Added resource '{}'.", name);
            }
            ["hold", name] => {
                let resource = self.resource(name)?;
                let task = ContinuousTask::new(|| {})
                    .requiring(resource)
                    .named(format!("hold-{}", name));
                let id = self.scheduler.register(task)?;
                println!("--> Queued 'hold-{}' as {:?}.", name, id);
            }
            ["release", name] => {
                let resource = self.resource(name)?;
                let id = self.scheduler.register(ReleaseTask::new(resource))?;
                println!("--> Queued release of '{}' as {:?}.", name, id);
            }
            ["default", name] => {
                let resource = self.resource(name)?;
                let task = ContinuousTask::new(|| {})
                    .requiring(resource)
                    .named(format!("default-{}", name));
                let id = self.scheduler.set_default(resource, task)?;
                println!("--> '{}' now defaults to {:?}.", name, id);
            }
            ["wait", secs] => {
                let value: f64 = secs
                    .parse()
                    .map_err(|_| anyhow!("'{}' is not a number of seconds", secs))?;
                let id = self.scheduler.register(WaitTask::new(seconds(value)?))?;
                println!("--> Queued a {}s wait as {:?}.", value, id);
            }
            ["tick"] => self.tick(1)?,
            ["tick", count] => {
                let count: u32 = count
                    .parse()
                    .map_err(|_| anyhow!("'{}' is not a tick count", count))?;
                self.tick(count)?;
            }
            ["status"] => self.print_status(),
            ["clear"] => {
                self.scheduler.remove_all()?;
                println!("--> All tasks interrupted.");
            }
            [command, ..] => {
                return Err(anyhow!(
                    "unknown or malformed command '{}'. Type 'help'.",
                    command
                ))
            }
            [] => {}
        }
        Ok(())
    }

    /// Everything the scheduler broadcast since the last call, minus tick heartbeats.
    pub fn drain_events(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(SchedulerEvent::TickCompleted { .. }) => {}
                Ok(event) => lines.push(format!("{:?}", event)),
                Err(TryRecvError::Lagged(missed)) => {
                    lines.push(format!("({} events skipped)", missed))
                }
                Err(_) => break,
            }
        }
        lines
    }

    fn resource(&self, name: &str) -> Result<ResourceId> {
        self.scheduler
            .resource_by_name(name)
            .ok_or_else(|| anyhow!("no resource named '{}'", name))
    }

    fn tick(&mut self, count: u32) -> Result<()> {
        for _ in 0..count {
            self.match_clock.advance(self.period);
            self.scheduler.tick(self.period)?;
        }
        println!(
            "--> Tick #{} at {:?}.",
            self.scheduler.tick_count(),
            self.scheduler.elapsed()
        );
        Ok(())
    }

    fn print_status(&self) {
        let s = &self.scheduler;
        println!(
            "Tick #{}  elapsed {:?}  pending {}",
            s.tick_count(),
            s.elapsed(),
            s.pending_count()
        );
        println!("Resources:");
        for (id, name) in s.resources() {
            let holder = s
                .holder(id)
                .and_then(|t| s.task_name(t))
                .unwrap_or("-");
            let default = match s.default_task(id) {
                Some(t) => format!(
                    "{} ({})",
                    s.task_name(t).unwrap_or("?"),
                    s.state(t).map_or("-".to_string(), |state| state.to_string())
                ),
                None => "-".to_string(),
            };
            println!("  {:<12} held by {:<20} default {}", name.cyan(), holder, default);
        }
        println!("Running:");
        for id in s.running() {
            println!("  {:?} {}", id, s.task_name(*id).unwrap_or("?"));
        }
    }
}
