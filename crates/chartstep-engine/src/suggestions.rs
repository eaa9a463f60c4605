//! Fuzzy matching suggestions for template errors

/// Maximum Levenshtein distance to consider for suggestions
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// All filters available to values-file templates
pub const AVAILABLE_FILTERS: &[&str] = &[
    // chartstep filters
    "toyaml",
    "tojson",
    "b64encode",
    "quote",
    "squote",
    "nindent",
    "indent",
    "required",
    // Built-in MiniJinja filters
    "default",
    "upper",
    "lower",
    "title",
    "replace",
    "trim",
    "join",
    "first",
    "last",
    "length",
    "reverse",
    "sort",
    "unique",
    "map",
    "select",
    "reject",
    "items",
    "int",
    "float",
    "string",
    "list",
    "bool",
    "urlencode",
];

/// Global functions available to values-file templates
pub const AVAILABLE_FUNCTIONS: &[&str] = &["range", "dict", "namespace", "cycler", "joiner"];

/// Find candidates within `MAX_SUGGESTION_DISTANCE` of `input`, best first
pub fn find_closest_matches<'a>(input: &str, candidates: &[&'a str], max_results: usize) -> Vec<&'a str> {
    let mut matches: Vec<(usize, &'a str)> = candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = strsim::levenshtein(input, candidate);
            (distance <= MAX_SUGGESTION_DISTANCE && distance > 0).then_some((distance, candidate))
        })
        .collect();

    matches.sort_by_key(|(distance, _)| *distance);
    matches.truncate(max_results);
    matches.into_iter().map(|(_, candidate)| candidate).collect()
}

/// Suggest corrections for an unknown filter
pub fn suggest_unknown_filter(filter_name: &str) -> Option<String> {
    let matches = find_closest_matches(filter_name, AVAILABLE_FILTERS, 3);

    if matches.is_empty() {
        Some(format!(
            "Unknown filter `{}`. Common filters: toyaml, tojson, quote, default, join, indent",
            filter_name
        ))
    } else {
        let suggestions: Vec<String> = matches.iter().map(|m| format!("`{}`", m)).collect();
        Some(format!("Did you mean {}?", suggestions.join(" or ")))
    }
}

pub fn suggest_unknown_function() -> String {
    format!(
        "Unknown function. Available functions: {}",
        AVAILABLE_FUNCTIONS.join(", ")
    )
}

/// Hint for list values used where a scalar is expected
pub fn suggest_list_usage() -> String {
    "List values from the pipeline environment cannot be used as scalars. \
     Use `| join(\",\")`, `| first` or a `{% for %}` loop."
        .to_string()
}
