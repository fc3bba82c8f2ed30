//! Reward command rendering

/// Substitute `{player}` and `{arena}` in each template, keeping order.
///
/// Placeholders are expanded in one pass, so a name that itself looks like a
/// placeholder is inserted literally. The result is handed to the host
/// dispatcher verbatim and runs with the host's privileges.
pub fn render_commands(templates: &[String], player: &str, arena: &str) -> Vec<String> {
    templates
        .iter()
        .map(|t| render(t, player, arena))
        .collect()
}

fn render(template: &str, player: &str, arena: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{player}") {
            out.push_str(player);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{arena}") {
            out.push_str(arena);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
