use std::cmp::Ordering;

/// Edit distance between two strings, counted in characters.
pub fn levenshtein(left: &str, right: &str) -> usize {
    let right_chars: Vec<char> = right.chars().collect();
    let mut previous: Vec<usize> = (0..=right_chars.len()).collect();
    let mut current = vec![0; right_chars.len() + 1];

    for (i, left_char) in left.chars().enumerate() {
        current[0] = i + 1;
        for (j, right_char) in right_chars.iter().enumerate() {
            current[j + 1] = if left_char == *right_char {
                previous[j]
            } else {
                1 + previous[j].min(previous[j + 1]).min(current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[right_chars.len()]
}

/// Returns every candidate within `max_distance` edits of `needle`, closest
/// first and alphabetical among equals. Comparison ignores case.
pub fn search<'a, I>(needle: &str, candidates: I, max_distance: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let needle = needle.to_lowercase();
    let mut matches: Vec<(usize, &str)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let distance = levenshtein(&needle, &candidate.to_lowercase());
            (distance <= max_distance).then_some((distance, candidate))
        })
        .collect();

    matches.sort_by(|(left_distance, left), (right_distance, right)| {
        match left_distance.cmp(right_distance) {
            Ordering::Equal => left.cmp(right),
            other => other,
        }
    });
    matches.dedup_by(|a, b| a.1 == b.1);
    matches
        .into_iter()
        .map(|(_, candidate)| candidate.to_string())
        .collect()
}

pub fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}
