use crate::commands::{prepare, CommandResult};
use wedmatch_core::{RecommendationError, RecommendationRequest, RecommendationServices};
use wedmatch_db::{connect_with_config, migrations, sql_stores};

#[derive(Debug, Clone, Default)]
pub struct RecommendArgs {
    pub wedding_id: String,
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub refresh: bool,
}

impl RecommendArgs {
    fn request(&self) -> RecommendationRequest {
        let mut request =
            RecommendationRequest::new(self.wedding_id.clone()).with_refresh(self.refresh);
        if let Some(category) = &self.category {
            request = request.with_category(category.clone());
        }
        if let Some(limit) = self.limit {
            request = request.with_limit(limit);
        }
        request
    }
}

pub fn run(args: RecommendArgs) -> CommandResult {
    let (config, runtime) = match prepare("recommend") {
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

        let services = RecommendationServices::new(
            sql_stores(&pool, config.cache.backend),
            config.recommendations.engine_settings(),
        );
        let response = services.engine.fetch(&args.request()).await.map_err(classify);

        pool.close().await;
        response
    });

    match result {
        Ok(response) => {
            let message = response.message.clone().unwrap_or_else(|| {
                let count = response.recommendations.len();
                format!("{count} recommendation(s) for {}", args.wedding_id)
            });
            CommandResult::success_with_data(
                "recommend",
                message,
                serde_json::to_value(&response).ok(),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("recommend", error_class, message, exit_code)
        }
    }
}

fn classify(error: RecommendationError) -> (&'static str, String, u8) {
    match error {
        RecommendationError::InvalidInput(message) => ("invalid_input", message, 7),
        RecommendationError::NotFound(message) => ("not_found", message, 8),
        RecommendationError::UpstreamUnavailable(message)
        | RecommendationError::CacheUnavailable(message) => ("upstream_unavailable", message, 4),
    }
}
