//! Active workspace and window title from the Hyprland compositor.
//!
//! Startup state comes from two request-socket queries (`activewindow` and `activeworkspace`);
//! after that the event socket keeps it current. Only `activewindow>>` and `workspacev2>>`
//! records matter, everything else on the stream is skipped.

use std::{
    net::Shutdown,
    os::unix::net::UnixStream,
    sync::{Mutex, MutexGuard, PoisonError},
};

use anyhow::Context;

use super::{Module, ModuleContext};
use crate::{
    content::ContentModel,
    field::Field,
    ipc::{EventReader, HyprSockets},
};

pub const WORKSPACE_COUNT: usize = 10;

/// Titles longer than this are cut down.
const MAX_TITLE_CHARS: usize = 71;
const ELLIPSIS: &str = "...";

const INVALID_REPLY: &str = "Invalid";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HyprEvent {
    ActiveWindow { title: String },
    /// Zero-based workspace slot.
    Workspace { index: usize },
}

impl HyprEvent {
    /// Parses one event line. `None` for events we ignore and for malformed records.
    pub fn parse(line: &str) -> Option<Self> {
        let (name, data) = line.split_once(">>")?;
        match name {
            "activewindow" => {
                let (_class, title) = data.split_once(',')?;
                Some(Self::ActiveWindow {
                    title: title.to_string(),
                })
            }
            "workspacev2" => {
                let id = data.split(',').next()?;
                workspace_index(id).map(|index| Self::Workspace { index })
            }
            _ => None,
        }
    }
}

/// Maps a 1-based Hyprland workspace id onto a slot.
pub fn workspace_index(id: &str) -> Option<usize> {
    let id: usize = id.trim().parse().ok()?;
    (1..=WORKSPACE_COUNT).contains(&id).then(|| id - 1)
}

pub fn truncate_title(title: &str) -> String {
    if title.chars().count() <= MAX_TITLE_CHARS {
        return title.to_string();
    }
    let keep = MAX_TITLE_CHARS - ELLIPSIS.len();
    let mut short: String = title.chars().take(keep).collect();
    short.push_str(ELLIPSIS);
    short
}

/// Title from an `activewindow` reply: `Window 55d0 -> TITLE:\n\t...`.
pub fn parse_active_window(reply: &str) -> Option<String> {
    if reply.trim() == INVALID_REPLY {
        return None;
    }
    let (_, rest) = reply.split_once("-> ")?;
    let title = match rest.split_once(":\n") {
        Some((title, _)) => title,
        None => rest.lines().next()?.trim_end_matches(':'),
    };
    Some(title.to_string())
}

/// Slot from an `activeworkspace` reply: `workspace ID 3 (3) on monitor DP-1:\n...`.
pub fn parse_active_workspace(reply: &str) -> Option<usize> {
    if reply.trim() == INVALID_REPLY {
        return None;
    }
    let (_, rest) = reply.split_once("ID ")?;
    workspace_index(rest.split_whitespace().next()?)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HyprlandState {
    workspaces: [bool; WORKSPACE_COUNT],
    window: String,
}

impl HyprlandState {
    pub fn apply(&mut self, event: HyprEvent) {
        match event {
            HyprEvent::ActiveWindow { title } => self.set_window(&title),
            HyprEvent::Workspace { index } => self.set_workspace(index),
        }
    }

    pub fn set_window(&mut self, title: &str) {
        self.window = truncate_title(title);
    }

    /// Marks `index` as the only active slot.
    pub fn set_workspace(&mut self, index: usize) {
        for (slot, active) in self.workspaces.iter_mut().enumerate() {
            *active = slot == index;
        }
    }

    pub fn active_workspace(&self) -> Option<usize> {
        self.workspaces.iter().position(|&active| active)
    }

    pub fn window(&self) -> &str {
        &self.window
    }

    /// `1 2 [3] 4 ...` with the active slot bracketed.
    pub fn workspaces_text(&self) -> String {
        self.workspaces
            .iter()
            .enumerate()
            .map(|(slot, &active)| {
                if active {
                    format!("[{}]", slot + 1)
                } else {
                    (slot + 1).to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub struct Hyprland {
    state: Mutex<HyprlandState>,
    events: UnixStream,
}

impl Hyprland {
    /// Queries the current state, then subscribes to the event socket.
    pub fn connect(sockets: &HyprSockets) -> anyhow::Result<Self> {
        let mut state = HyprlandState::default();

        let reply = sockets
            .request("activewindow")
            .context("activewindow query failed")?;
        if let Some(title) = parse_active_window(&reply) {
            state.set_window(&title);
        }

        let reply = sockets
            .request("activeworkspace")
            .context("activeworkspace query failed")?;
        if let Some(index) = parse_active_workspace(&reply) {
            state.set_workspace(index);
        }

        log::debug!(
            "hyprland workspace {:?}, window {:?}",
            state.active_workspace(),
            state.window()
        );

        let events = sockets
            .events()
            .context("failed to subscribe to Hyprland events")?;

        Ok(Self {
            state: Mutex::new(state),
            events,
        })
    }

    fn lock(&self) -> MutexGuard<'_, HyprlandState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Module for Hyprland {
    fn name(&self) -> &'static str {
        "hyprland"
    }

    fn publish(&self, model: &ContentModel) {
        let state = self.lock();
        model.publish(Field::Workspaces, state.workspaces_text());
        model.publish(Field::Window, state.window());
    }

    fn run(self: Box<Self>, ctx: ModuleContext) -> anyhow::Result<()> {
        let stream = self.events.try_clone()?;
        ctx.cancel.on_cancel(move || {
            // Unblocks the read below with EOF
            if let Err(err) = stream.shutdown(Shutdown::Both) {
                log::debug!("shutting down Hyprland event socket: {err}");
            }
        });

        let mut events = EventReader::new(&self.events);
        while let Some(line) = events.next_line()? {
            let Some(event) = HyprEvent::parse(&line) else {
                log::trace!("skipping event {line:?}");
                continue;
            };
            log::debug!("{event:?}");
            self.lock().apply(event);
            ctx.publish(&*self);
        }

        if ctx.cancel.is_cancelled() {
            Ok(())
        } else {
            anyhow::bail!("Hyprland closed the event socket")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;
    use crate::modules::{CancelToken, Notifier};

    fn offline(events: UnixStream) -> Box<Hyprland> {
        Box::new(Hyprland {
            state: Mutex::default(),
            events,
        })
    }

    fn context(cancel: &CancelToken) -> ModuleContext {
        ModuleContext {
            cancel: cancel.clone(),
            model: Arc::new(ContentModel::default()),
            notifier: Notifier::new(|| {}),
        }
    }

    #[test]
    fn workspace_ids_are_one_based() {
        assert_eq!(workspace_index("1"), Some(0));
        assert_eq!(workspace_index("10"), Some(9));
        assert_eq!(workspace_index("0"), None);
        assert_eq!(workspace_index("11"), None);
        assert_eq!(workspace_index("-98"), None);
        assert_eq!(workspace_index("special"), None);
    }

    #[test]
    fn parses_events_of_interest() {
        assert_eq!(
            HyprEvent::parse("activewindow>>kitty,~/src: nvim"),
            Some(HyprEvent::ActiveWindow {
                title: "~/src: nvim".into()
            })
        );
        assert_eq!(
            HyprEvent::parse("activewindow>>firefox,Inbox, 3 unread"),
            Some(HyprEvent::ActiveWindow {
                title: "Inbox, 3 unread".into()
            })
        );
        assert_eq!(
            HyprEvent::parse("workspacev2>>3,3"),
            Some(HyprEvent::Workspace { index: 2 })
        );
    }

    #[test]
    fn ignores_other_and_malformed_events() {
        assert_eq!(HyprEvent::parse("workspace>>3"), None);
        assert_eq!(HyprEvent::parse("activewindow>>no-comma"), None);
        assert_eq!(HyprEvent::parse("workspacev2>>42,42"), None);
        assert_eq!(HyprEvent::parse("garbage"), None);
    }

    #[test]
    fn long_titles_get_an_ellipsis() {
        let short = "a".repeat(MAX_TITLE_CHARS);
        assert_eq!(truncate_title(&short), short);

        let long = "é".repeat(100);
        let cut = truncate_title(&long);
        assert_eq!(cut.chars().count(), MAX_TITLE_CHARS);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn workspace_switch_is_exclusive() {
        let mut state = HyprlandState::default();
        state.apply(HyprEvent::Workspace { index: 0 });
        state.apply(HyprEvent::Workspace { index: 4 });
        assert_eq!(state.active_workspace(), Some(4));
        assert_eq!(state.workspaces.iter().filter(|&&active| active).count(), 1);
        assert_eq!(state.workspaces_text(), "1 2 3 4 [5] 6 7 8 9 10");
    }

    #[test]
    fn startup_replies() {
        let window = "Window 55d0c0a0 -> kitty:\n\tmapped: 1\n\thidden: 0\n";
        assert_eq!(parse_active_window(window).as_deref(), Some("kitty"));
        assert_eq!(parse_active_window("Invalid"), None);

        let workspace = "workspace ID 3 (3) on monitor DP-1:\n\twindows: 2\n";
        assert_eq!(parse_active_workspace(workspace), Some(2));
        assert_eq!(parse_active_workspace("Invalid\n"), None);
    }

    #[test]
    fn invalid_startup_leaves_fields_empty() {
        let model = ContentModel::new(crate::content::Layout {
            start: vec![Field::Workspaces],
            center: vec![Field::Window],
            ..Default::default()
        });
        let state = HyprlandState::default();
        model.publish(Field::Window, state.window());
        assert_eq!(
            crate::content::split_segments(&model.status())[1],
            ""
        );
        assert_eq!(state.workspaces_text(), "1 2 3 4 5 6 7 8 9 10");
    }

    #[test_log::test]
    fn cancel_unblocks_the_event_read() {
        let (events, _compositor) = UnixStream::pair().unwrap();
        let cancel = CancelToken::default();
        let reader = {
            let ctx = context(&cancel);
            thread::spawn(move || offline(events).run(ctx))
        };

        thread::sleep(Duration::from_millis(20));
        cancel.cancel();
        assert!(reader.join().unwrap().is_ok());
    }

    #[test_log::test]
    fn cancel_before_run_ends_it_cleanly() {
        let (events, compositor) = UnixStream::pair().unwrap();
        drop(compositor);
        let cancel = CancelToken::default();
        cancel.cancel();
        assert!(offline(events).run(context(&cancel)).is_ok());
    }
}
