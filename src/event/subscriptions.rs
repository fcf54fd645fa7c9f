use std::collections::{HashMap, HashSet};

use super::{
    handler::{handler_addr, same_handler, HandlerRef},
    name,
};

#[derive(Default)]
struct Node {
    handlers: Vec<HandlerRef>,
    children: HashMap<String, Node>,
}

impl Node {
    fn is_empty(&self) -> bool {
        self.handlers.is_empty() && self.children.is_empty()
    }
}

/// Префиксное дерево подписок по сегментам имени события.
///
/// Узел `A.B` хранит подписчиков ровно на `A.B`; доставка события `A.B.C`
/// проходит путь `A → A.B → A.B.C` и собирает подписчиков каждого уровня.
#[derive(Default)]
pub(crate) struct SubscriptionTree {
    root: Node,
}

impl SubscriptionTree {
    /// Добавляет подписчика; возвращает число подписчиков на `event`.
    pub fn add(
        &mut self,
        event: &str,
        handler: HandlerRef,
    ) -> usize {
        let mut node = &mut self.root;
        for seg in name::segments(event) {
            node = node.children.entry(seg.to_string()).or_default();
        }
        if !node.handlers.iter().any(|h| same_handler(h, &handler)) {
            node.handlers.push(handler);
        }
        node.handlers.len()
    }

    /// Удаляет подписчика и пустые узлы; возвращает оставшееся число
    /// подписчиков на `event`.
    pub fn remove(
        &mut self,
        event: &str,
        handler: &HandlerRef,
    ) -> usize {
        let segs: Vec<&str> = name::segments(event).collect();
        remove_at(&mut self.root, &segs, handler)
    }

    /// Снимок подписчиков `event` и всех его предков, без повторов.
    ///
    /// Порядок: от корня к самому глубокому уровню, внутри уровня по
    /// порядку подписки.
    pub fn collect(
        &self,
        event: &str,
    ) -> Vec<HandlerRef> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut node = &self.root;
        for seg in name::segments(event) {
            let Some(child) = node.children.get(seg) else {
                break;
            };
            node = child;
            for h in &node.handlers {
                if seen.insert(handler_addr(h)) {
                    out.push(h.clone());
                }
            }
        }
        out
    }

    pub fn count(
        &self,
        event: &str,
    ) -> usize {
        self.find(event).map_or(0, |n| n.handlers.len())
    }

    /// `exact = true`: подписчики ровно на `event`; иначе также на любого
    /// предка.
    pub fn has_subscribers(
        &self,
        event: &str,
        exact: bool,
    ) -> bool {
        if exact {
            return self.count(event) > 0;
        }
        let mut node = &self.root;
        for seg in name::segments(event) {
            match node.children.get(seg) {
                Some(child) => node = child,
                None => return false,
            }
            if !node.handlers.is_empty() {
                return true;
            }
        }
        false
    }

    /// Имена всех событий, на которые есть хотя бы одна подписка.
    pub fn event_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_names(&self.root, &mut String::new(), &mut out);
        out.sort();
        out
    }

    pub fn clear(&mut self) {
        self.root = Node::default();
    }

    fn find(
        &self,
        event: &str,
    ) -> Option<&Node> {
        let mut node = &self.root;
        for seg in name::segments(event) {
            node = node.children.get(seg)?;
        }
        Some(node)
    }
}

fn remove_at(
    node: &mut Node,
    segs: &[&str],
    handler: &HandlerRef,
) -> usize {
    let Some((head, rest)) = segs.split_first() else {
        node.handlers.retain(|h| !same_handler(h, handler));
        return node.handlers.len();
    };
    let Some(child) = node.children.get_mut(*head) else {
        return 0;
    };
    let remaining = remove_at(child, rest, handler);
    if child.is_empty() {
        node.children.remove(*head);
    }
    remaining
}

fn collect_names(
    node: &Node,
    prefix: &mut String,
    out: &mut Vec<String>,
) {
    for (seg, child) in &node.children {
        let len = prefix.len();
        if !prefix.is_empty() {
            prefix.push(name::SEGMENT_DELIM);
        }
        prefix.push_str(seg);
        if !child.handlers.is_empty() {
            out.push(prefix.clone());
        }
        collect_names(child, prefix, out);
        prefix.truncate(len);
    }
}
