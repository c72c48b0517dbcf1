//! Display label derivation for types and members.

/// Derives a label from a type or identity name by inserting a space before
/// every capital letter.
///
/// `ServerSettings` becomes `Server Settings`.
pub fn type_label(name: &str) -> String {
    let mut label = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_uppercase() {
            label.push(' ');
        }
        label.push(ch);
    }
    label.trim().to_string()
}

/// Derives a label from a snake_case member name.
///
/// `max_players` becomes `Max Players`.
pub fn member_label(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
