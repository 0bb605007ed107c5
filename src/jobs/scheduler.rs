use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::model::{Job, NewJob};
use super::registry::JobRegistry;
use crate::config::SchedulerSettings;
use crate::types::ValueMapping;

const SAMPLE_FORM_URL: &str = "https://magical-medical-form.netlify.app/";

/// A named value mapping the scheduler can enqueue.
#[derive(Debug, Clone)]
pub struct ValueSet {
    pub name: String,
    pub url: String,
    pub form_data: ValueMapping,
}

impl ValueSet {
    fn new(name: &str, url: &str, pairs: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            form_data: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn to_request(&self) -> NewJob {
        NewJob {
            url: self.url.clone(),
            form_data: self.form_data.clone(),
            name: Some(self.name.clone()),
        }
    }
}

/// The built-in rotation of sample medical-form submissions.
pub fn sample_value_sets() -> Vec<ValueSet> {
    vec![
        ValueSet::new(
            "Medical Form - Set 1",
            SAMPLE_FORM_URL,
            &[
                ("firstName", "John"),
                ("lastName", "Doe"),
                ("dateOfBirth", "1990-01-01"),
                ("medicalId", "12345"),
                ("gender", "Male"),
                ("bloodType", "O+"),
                ("allergies", ""),
                ("currentMedications", ""),
                ("emergencyContact", "Jane Doe"),
                ("emergencyPhone", "555-1234"),
            ],
        ),
        ValueSet::new(
            "Medical Form - Set 2",
            SAMPLE_FORM_URL,
            &[
                ("firstName", "Sarah"),
                ("lastName", "Smith"),
                ("dateOfBirth", "1985-05-15"),
                ("medicalId", "67890"),
                ("gender", "Female"),
                ("bloodType", "A+"),
                ("allergies", "Peanuts"),
                ("currentMedications", "Vitamin D"),
                ("emergencyContact", "Mike Smith"),
                ("emergencyPhone", "555-5678"),
            ],
        ),
        ValueSet::new(
            "Medical Form - Set 3",
            SAMPLE_FORM_URL,
            &[
                ("firstName", "Mike"),
                ("lastName", "Johnson"),
                ("dateOfBirth", "1988-12-03"),
                ("medicalId", "11111"),
                ("gender", "Male"),
                ("bloodType", "B-"),
                ("allergies", "Shellfish"),
                ("currentMedications", "None"),
                ("emergencyContact", "Lisa Johnson"),
                ("emergencyPhone", "555-9999"),
            ],
        ),
    ]
}

/// Periodically enqueues a random value set from a fixed rotation.
pub struct JobScheduler {
    registry: JobRegistry,
    rotation: Vec<ValueSet>,
    settings: SchedulerSettings,
}

impl JobScheduler {
    pub fn new(registry: JobRegistry, rotation: Vec<ValueSet>, settings: SchedulerSettings) -> Self {
        Self {
            registry,
            rotation,
            settings,
        }
    }

    /// The first job is created immediately, then one per interval, until
    /// `shutdown` changes or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval = ?self.settings.interval, "scheduler started");
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            self.enqueue_one();
        }
        info!("scheduler stopped");
    }

    pub fn enqueue_one(&self) -> Option<Job> {
        if self.rotation.is_empty() {
            warn!("scheduler has no value sets to enqueue");
            return None;
        }
        let set = &self.rotation[rand::random_range(0..self.rotation.len())];

        let job = self.registry.create(set.to_request());
        info!(job = %job.id, set = %set.name, "created scheduled job");
        Some(job)
    }
}
