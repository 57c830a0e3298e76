use colored::Colorize;
use serde::Serialize;

use strand_codec::LoaderCodec;
use strand_graph::{Node, ParentRef};
use strand_store::{ContentStore, InMemoryContentStore};
use strand_types::{LinkToken, Loader, NodeResult};

/// One printed line of a graph outline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutlineLine {
    pub depth: usize,
    pub token: String,
    pub kind: String,
    pub text: String,
    /// Encoded continuation, for load-more lines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opaque: Option<String>,
    pub error: bool,
}

/// Walk the graph below `root`, children in display order.
pub fn outline(
    store: &InMemoryContentStore<Node>,
    root: LinkToken,
    max_depth: usize,
) -> Vec<OutlineLine> {
    let mut lines = Vec::new();
    let mut path = Vec::new();
    walk(store, root, 0, max_depth, &mut path, &mut lines);
    lines
}

fn walk(
    store: &InMemoryContentStore<Node>,
    token: LinkToken,
    depth: usize,
    max_depth: usize,
    path: &mut Vec<LinkToken>,
    lines: &mut Vec<OutlineLine>,
) {
    let line = |kind: &str, text: String, error: bool| OutlineLine {
        depth,
        token: token.short_hex(),
        kind: kind.to_string(),
        text,
        opaque: None,
        error,
    };
    if path.contains(&token) {
        lines.push(line("cycle", "(already shown above)".into(), false));
        return;
    }
    let node = match store.get(&token) {
        None => {
            lines.push(line("missing", "(no entry)".into(), true));
            return;
        }
        Some(NodeResult::Error(message)) => {
            lines.push(line("error", message, true));
            return;
        }
        Some(NodeResult::Data(node)) => node,
    };

    let mut entry = line(node.kind(), describe(&node), false);
    if let Node::LoadMore(more) = &node {
        entry.opaque = LoaderCodec::encode(Loader::CODEC_TAG, &more.loader)
            .ok()
            .map(|opaque| opaque.to_string());
    }
    lines.push(entry);

    let children = node.references();
    if children.is_empty() {
        return;
    }
    if depth + 1 > max_depth {
        lines.push(OutlineLine {
            depth: depth + 1,
            token: String::new(),
            kind: "elided".into(),
            text: format!("{} more below", children.len()),
            opaque: None,
            error: false,
        });
        return;
    }
    path.push(token);
    for child in children {
        walk(store, child, depth + 1, max_depth, path, lines);
    }
    path.pop();
}

/// Loaders of the load-more nodes below `root`, in display order.
pub fn continuations(store: &InMemoryContentStore<Node>, root: LinkToken) -> Vec<Loader> {
    let mut loaders = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut stack = vec![root];
    while let Some(token) = stack.pop() {
        if !seen.insert(token) {
            continue;
        }
        let Some((loader, children)) =
            store.with_data(&token, |node| (node.loader().cloned(), node.references()))
        else {
            continue;
        };
        loaders.extend(loader);
        stack.extend(children.into_iter().rev());
    }
    loaders
}

fn describe(node: &Node) -> String {
    match node {
        Node::Post(post) => {
            let mut text = match &post.title {
                Some(title) => title.clone(),
                None => post.body.summary(72),
            };
            let author = post.author.as_deref().unwrap_or("[deleted]");
            text.push_str(&format!(" (u/{author}"));
            if let Some(score) = post.score {
                text.push_str(&format!(", {score} points"));
            }
            text.push(')');
            if post.stickied {
                text.push_str(" [stickied]");
            }
            if post.locked {
                text.push_str(" [locked]");
            }
            if let Some(ParentRef::Deferred { crumbs, .. }) = &post.parent {
                let trail: Vec<&str> = crumbs.iter().map(|c| c.label.as_str()).collect();
                text.push_str(&format!(" in {}", trail.join(" > ")));
            }
            text
        }
        Node::Listing(listing) => format!("{} {}", listing.title, listing.url),
        Node::LoadMore(more) => match more.count {
            Some(count) => format!("load {count} more ({})", more.loader.kind()),
            None => format!("load more ({})", more.loader.kind()),
        },
        Node::About(about) => match about.subscribers {
            Some(n) => format!("r/{}: {} ({n} subscribers)", about.subreddit, about.title),
            None => format!("r/{}: {}", about.subreddit, about.title),
        },
        Node::UserList(list) => {
            let names: Vec<&str> = list.users.iter().map(|u| u.name.as_str()).collect();
            format!("{}: {}", list.title, names.join(", "))
        }
        Node::Unsupported { discriminant, .. } => format!("unsupported payload {discriminant}"),
    }
}

pub fn print(lines: &[OutlineLine]) {
    for line in lines {
        let indent = "  ".repeat(line.depth);
        let kind = format!("[{}]", line.kind);
        let kind = if line.error {
            kind.red().bold()
        } else if line.opaque.is_some() {
            kind.cyan()
        } else {
            kind.normal()
        };
        println!("{indent}{} {kind} {}", line.token.dimmed(), line.text);
        if let Some(opaque) = &line.opaque {
            println!("{indent}  {} {}", "expand:".dimmed(), opaque);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_graph::{Document, ListingNode, LoadMoreNode, PostKind, PostNode, Replies};
    use strand_ident::fresh_token;
    use strand_types::{ListingSort, Loader};

    fn post(title: &str, replies: Vec<LinkToken>) -> Node {
        Node::Post(PostNode {
            kind: PostKind::Post,
            url: None,
            disallow_pivot: true,
            title: Some(title.into()),
            body: Document::default(),
            author: Some("alice".into()),
            created: None,
            score: Some(3),
            stickied: false,
            locked: false,
            embed: None,
            parent: None,
            replies: (!replies.is_empty()).then_some(Replies { items: replies }),
        })
    }

    #[test]
    fn outline_lists_children_in_order() {
        let store = InMemoryContentStore::new();
        let error = store.create_error_node("bad comment", "comment");
        let more = store.insert_fresh(
            "more",
            Node::LoadMore(LoadMoreNode {
                loader: Loader::ListingPage {
                    subreddit: "rust".into(),
                    sort: ListingSort::Hot,
                    after: Some("t3_x".into()),
                },
                count: None,
            }),
        );
        let child = store.insert_fresh("child", post("child", vec![]));
        let root = store.insert_fresh(
            "root",
            Node::Listing(ListingNode {
                url: "/r/rust".into(),
                title: "r/rust".into(),
                header: None,
                items: vec![child, error, more],
            }),
        );

        let lines = outline(&store, root, 8);
        let kinds: Vec<&str> = lines.iter().map(|l| l.kind.as_str()).collect();
        assert_eq!(kinds, vec!["listing", "post", "error", "load-more"]);
        assert_eq!(lines[1].text, "child (u/alice, 3 points)");
        assert!(lines[2].error);
        assert!(lines[3].opaque.is_some());
        assert_eq!(lines[3].depth, 1);

        let loaders = continuations(&store, root);
        assert_eq!(loaders.len(), 1);
        assert_eq!(loaders[0].kind(), "listing_page");
    }

    #[test]
    fn depth_limit_elides_children() {
        let store = InMemoryContentStore::new();
        let leaf = store.insert_fresh("leaf", post("leaf", vec![]));
        let root = store.insert_fresh("root", post("root", vec![leaf]));
        let lines = outline(&store, root, 0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].kind, "elided");
        assert_eq!(lines[1].text, "1 more below");
    }

    #[test]
    fn missing_entries_are_flagged() {
        let store = InMemoryContentStore::<Node>::new();
        let lines = outline(&store, fresh_token("nowhere"), 8);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].kind, "missing");
        assert!(lines[0].error);
    }
}
