use rand::Rng;
use stampede_core::{Request, RequestTemplate, DEFAULT_RANDOM_RANGE};

const VU: &str = "{vu}";
const ITER: &str = "{iter}";
const RAND: &str = "{rand}";

/// Builds the [`Request`] for each iteration from the scenario's template.
#[derive(Clone, Debug)]
pub(crate) struct RequestFactory {
    template: RequestTemplate,
    low: u64,
    high: u64,
    needs_rand: bool,
}

impl RequestFactory {
    pub fn new(template: RequestTemplate) -> Self {
        let (low, high) = template.random_range.unwrap_or(DEFAULT_RANDOM_RANGE);
        let needs_rand = template.query_id.contains(RAND) || template.query_sql.contains(RAND);
        Self {
            template,
            low,
            high,
            needs_rand,
        }
    }

    /// `{rand}` is drawn once so the id and the SQL carry the same value.
    pub fn build(&self, vu: u64, iteration: u64) -> Request {
        let rand = if self.needs_rand {
            rand::thread_rng().gen_range(self.low..=self.high)
        } else {
            0
        };

        Request::new(
            self.render(&self.template.query_id, vu, iteration, rand),
            self.render(&self.template.query_sql, vu, iteration, rand),
        )
    }

    fn render(&self, text: &str, vu: u64, iteration: u64, rand: u64) -> String {
        if !text.contains('{') {
            return text.to_string();
        }

        text.replace(VU, &vu.to_string())
            .replace(ITER, &iteration.to_string())
            .replace(RAND, &rand.to_string())
    }
}
