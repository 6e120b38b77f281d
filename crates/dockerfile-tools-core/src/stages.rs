use crate::model::Node;

const ALIAS_KEYWORD: &str = "AS";

/// Stage aliases from `FROM <image> AS <name>`, in source order.
///
/// Only the first `AS` of each `FROM` counts; a trailing `AS` with nothing
/// after it names no stage. Duplicate names are kept. The match is exact, so
/// a lowercase `as` is an ordinary token.
pub fn list_stages(root: &Node) -> Vec<String> {
    root.children
        .iter()
        .filter(|child| child.is_instruction("FROM"))
        .filter_map(stage_alias)
        .map(str::to_string)
        .collect()
}

fn stage_alias(from: &Node) -> Option<&str> {
    from.args()
        .find(|arg| arg.keyword == ALIAS_KEYWORD)
        .and_then(|alias| alias.next.as_deref())
        .map(|name| name.keyword.as_str())
}
