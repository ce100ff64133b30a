use crate::commands::{prepare, CommandResult};
use wedmatch_db::{connect_with_config, migrations, DemoDataset};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seeded = DemoDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        pool.close().await;

        if verification.all_present {
            Ok(seeded)
        } else {
            Err(("seed_verification", verification_failure_message(&verification.checks), 6u8))
        }
    });

    match result {
        Ok(seeded) => CommandResult::success(
            "seed",
            format!(
                "demo dataset loaded: {} weddings ({}), {} with preferences, {} vendors",
                seeded.weddings,
                DemoDataset::WEDDING_IDS.join(", "),
                seeded.preferences,
                seeded.vendors
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn verification_failure_message(checks: &[(&'static str, bool)]) -> String {
    let failed_checks =
        checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_failure_message;

    #[test]
    fn verification_message_names_failed_checks() {
        let checks = [("weddings", true), ("preferences", false), ("vendors", false)];
        assert_eq!(
            verification_failure_message(&checks),
            "seed verification failed for checks: preferences, vendors"
        );
    }

    #[test]
    fn verification_message_falls_back_when_nothing_failed() {
        let checks = [("weddings", true), ("vendors", true)];
        assert_eq!(verification_failure_message(&checks), "some seed data failed to load");
    }
}
