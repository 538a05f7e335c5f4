use mockoon_schema::{Environment, Route};

/// Path matcher for one environment's routes.
///
/// Matching is segment by segment against `endpointPrefix/endpoint`. A
/// `:name` segment matches any single non-empty segment and a `*` segment
/// matches any run of segments, including none. Routes are tried in
/// definition order and the first match wins.
pub struct RouteTable {
    entries: Vec<(Vec<String>, usize)>,
}

pub(crate) fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

impl RouteTable {
    pub fn new(env: &Environment) -> Self {
        let prefix = segments(&env.endpoint_prefix);
        let entries = env
            .routes
            .iter()
            .enumerate()
            .map(|(i, route)| {
                let mut pattern = prefix.clone();
                pattern.extend(segments(&route.endpoint));
                (pattern, i)
            })
            .collect();
        Self { entries }
    }

    pub fn find<'a>(&self, env: &'a Environment, method: &str, path: &str) -> Option<&'a Route> {
        let wanted = segments(path);
        self.entries
            .iter()
            .filter(|(pattern, _)| pattern_matches(pattern, &wanted))
            .map(|(_, i)| &env.routes[*i])
            .find(|route| method_matches(&route.method, method))
    }
}

fn pattern_matches(pattern: &[String], path: &[String]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((head, rest)) if head == "*" => {
            (0..=path.len()).any(|skip| pattern_matches(rest, &path[skip..]))
        }
        Some((head, rest)) => match path.split_first() {
            Some((segment, tail)) => {
                (head.starts_with(':') || head == segment) && pattern_matches(rest, tail)
            }
            None => false,
        },
    }
}

fn method_matches(route_method: &str, method: &str) -> bool {
    route_method.eq_ignore_ascii_case("all") || route_method.eq_ignore_ascii_case(method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(prefix: &str) -> Environment {
        serde_json::from_value(json!({
            "lastMigration": 9,
            "name": "routes",
            "port": 3000,
            "endpointPrefix": prefix,
            "routes": [
                { "method": "get", "endpoint": "users" },
                { "method": "get", "endpoint": "users/:id" },
                { "method": "post", "endpoint": "users" },
                { "method": "all", "endpoint": "any" },
                { "method": "get", "endpoint": "files/*" },
                { "method": "get", "endpoint": "*/health" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn exact_and_param_segments() {
        let env = env("");
        let table = RouteTable::new(&env);
        assert_eq!(table.find(&env, "GET", "/users").unwrap().endpoint, "users");
        assert_eq!(
            table.find(&env, "GET", "/users/42").unwrap().endpoint,
            "users/:id"
        );
        assert!(table.find(&env, "GET", "/users/42/posts").is_none());
    }

    #[test]
    fn wildcard_spans_segments() {
        let env = env("api");
        let table = RouteTable::new(&env);
        for path in ["/api/files", "/api/files/a", "/api/files/a/b/c.txt"] {
            assert_eq!(table.find(&env, "GET", path).unwrap().endpoint, "files/*");
        }
        assert_eq!(
            table.find(&env, "GET", "/api/v2/internal/health").unwrap().endpoint,
            "*/health"
        );
        assert!(table.find(&env, "GET", "/api/v2/healthz").is_none());
        assert!(table.find(&env, "POST", "/api/files/a").is_none());
    }

    #[test]
    fn method_must_match() {
        let env = env("");
        let table = RouteTable::new(&env);
        assert_eq!(table.find(&env, "POST", "/users").unwrap().method, "post");
        assert!(table.find(&env, "DELETE", "/users").is_none());
        assert!(table.find(&env, "PATCH", "/any").is_some());
    }

    #[test]
    fn prefix_is_required() {
        let env = env("/api/v1/");
        let table = RouteTable::new(&env);
        assert!(table.find(&env, "GET", "/users").is_none());
        assert!(table.find(&env, "GET", "/api/v1/users").is_some());
    }

    #[test]
    fn trailing_slash_is_ignored() {
        let env = env("");
        let table = RouteTable::new(&env);
        assert!(table.find(&env, "GET", "/users/").is_some());
    }
}
