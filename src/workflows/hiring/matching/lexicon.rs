use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

/// Alias to canonical skill token.
static ALIAS_TO_CANONICAL: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let aliases: &[(&str, &[&str])] = &[
        ("python", &["python", "py", "python3", "python 3"]),
        ("java", &["java", "jdk", "java se"]),
        ("javascript", &["javascript", "js", "ecmascript", "es6"]),
        ("typescript", &["typescript", "ts"]),
        ("nodejs", &["nodejs", "node.js", "node js", "node"]),
        ("react", &["react", "reactjs", "react.js"]),
        ("angular", &["angular", "angularjs", "angular.js"]),
        ("vue", &["vue", "vuejs", "vue.js"]),
        ("c++", &["c++", "cpp", "cplusplus"]),
        ("c#", &["c#", "csharp", "c sharp"]),
        ("go", &["go", "golang"]),
        ("rust", &["rust", "rustlang"]),
        ("ruby", &["ruby", "ruby on rails", "rails"]),
        ("php", &["php", "laravel"]),
        ("sql", &["sql", "t-sql", "tsql", "pl/sql", "plsql"]),
        ("postgresql", &["postgresql", "postgres", "psql"]),
        ("mysql", &["mysql", "mariadb"]),
        ("mongodb", &["mongodb", "mongo"]),
        ("redis", &["redis"]),
        ("aws", &["aws", "amazon web services"]),
        ("gcp", &["gcp", "google cloud", "google cloud platform"]),
        ("azure", &["azure", "microsoft azure"]),
        ("docker", &["docker", "containers"]),
        ("kubernetes", &["kubernetes", "k8s"]),
        ("terraform", &["terraform"]),
        ("linux", &["linux", "unix"]),
        ("git", &["git", "github", "gitlab"]),
        ("machine learning", &["machine learning", "ml"]),
        ("deep learning", &["deep learning", "dl"]),
        ("data analysis", &["data analysis", "data analytics", "analytics"]),
        ("pandas", &["pandas"]),
        ("numpy", &["numpy"]),
        ("tensorflow", &["tensorflow"]),
        ("pytorch", &["pytorch", "torch"]),
        ("spark", &["spark", "apache spark", "pyspark"]),
        ("excel", &["excel", "ms excel", "microsoft excel"]),
        ("tableau", &["tableau"]),
        ("power bi", &["power bi", "powerbi"]),
        ("html", &["html", "html5"]),
        ("css", &["css", "css3", "scss", "sass"]),
        ("rest", &["rest", "restful", "rest api", "rest apis"]),
        ("graphql", &["graphql"]),
        ("agile", &["agile", "scrum", "kanban"]),
        ("project management", &["project management", "pmp"]),
        ("communication", &["communication", "communications"]),
        ("leadership", &["leadership", "team leadership"]),
    ];

    let mut map = HashMap::new();
    for (canonical, variants) in aliases {
        map.insert(*canonical, *canonical);
        for variant in *variants {
            map.insert(*variant, *canonical);
        }
    }
    map
});

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "about", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "for",
        "from", "has", "have", "in", "into", "is", "it", "its", "of", "on", "or", "our", "that",
        "the", "their", "this", "to", "was", "we", "were", "will", "with", "you", "your",
    ]
    .into_iter()
    .collect()
});

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical form of a skill token. Unknown skills are lowercased and trimmed.
pub fn normalize_skill(raw: &str) -> String {
    let collapsed = collapse_whitespace(&raw.to_lowercase());
    match ALIAS_TO_CANONICAL.get(collapsed.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => collapsed,
    }
}

pub fn normalize_skill_set<'a, I>(skills: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a String>,
{
    skills
        .into_iter()
        .map(|skill| normalize_skill(skill))
        .filter(|skill| !skill.is_empty())
        .collect()
}

/// Dictionary lookup over the unigrams and bigrams of a free text.
pub fn extract_skills(text: &str) -> BTreeSet<String> {
    let words = raw_words(text);
    let mut found = BTreeSet::new();

    for window in words.windows(2) {
        let bigram = format!("{} {}", window[0], window[1]);
        if let Some(canonical) = ALIAS_TO_CANONICAL.get(bigram.as_str()) {
            found.insert((*canonical).to_string());
        }
    }

    for word in &words {
        // Single letters such as "c" or "r" are too ambiguous in prose.
        if word.len() < 2 {
            continue;
        }
        if let Some(canonical) = ALIAS_TO_CANONICAL.get(word.as_str()) {
            found.insert((*canonical).to_string());
        }
    }

    found
}

fn raw_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|ch: char| !(ch.is_alphanumeric() || ch == '+' || ch == '#' || ch == '.'))
        .map(|word| word.trim_matches('.'))
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// Scoring terms: lowercase, stop words and single characters removed.
pub fn tokenize(text: &str) -> Vec<String> {
    raw_words(text)
        .into_iter()
        .filter(|word| word.chars().count() > 1)
        .filter(|word| !STOP_WORDS.contains(word.as_str()))
        .collect()
}
