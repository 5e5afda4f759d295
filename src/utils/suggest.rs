fn normalize_token(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    let m = b.chars().count();
    if a.is_empty() || m == 0 {
        return a.chars().count().max(m);
    }

    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0; m + 1];
    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        prev.clone_from_slice(&curr);
    }
    prev[m]
}

fn max_allowed_distance(input: &str) -> usize {
    match normalize_token(input).len() {
        0 => 0,
        1..=4 => 1,
        5..=8 => 2,
        n => (n as f32 * 0.35).floor().max(3.0) as usize,
    }
}

/// Near-miss candidates for an unknown tool name, closest first.
pub fn suggest(input: &str, candidates: &[String], limit: usize) -> Vec<String> {
    let needle = normalize_token(input);
    if needle.is_empty() || candidates.is_empty() {
        return Vec::new();
    }
    let allowed = max_allowed_distance(input);
    let mut scored: Vec<(String, usize)> = candidates
        .iter()
        .filter_map(|candidate| {
            let hay = normalize_token(candidate);
            if hay.is_empty() {
                return None;
            }
            let score = if needle == hay {
                0
            } else if needle.contains(&hay) || hay.contains(&needle) {
                1
            } else {
                levenshtein(&needle, &hay)
            };
            (score <= allowed).then(|| (candidate.clone(), score))
        })
        .collect();
    scored.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    scored
        .into_iter()
        .take(limit.max(1))
        .map(|(name, _)| name)
        .collect()
}
