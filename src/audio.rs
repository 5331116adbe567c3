use log::debug;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Audio capability handed to programs as `Muse`. Playback belongs to the host;
/// this side only remembers which cues a run asked for.
#[derive(Clone)]
pub struct AudioHandle {
    cues: Rc<RefCell<VecDeque<String>>>,
    limit: usize,
}

impl AudioHandle {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self { cues: Rc::new(RefCell::new(VecDeque::with_capacity(limit))), limit }
    }

    pub fn play(&mut self, cue: &str) {
        debug!("[muse] play {cue}");
        let mut cues = self.cues.borrow_mut();
        while cues.len() >= self.limit {
            cues.pop_front();
        }
        cues.push_back(cue.to_string());
    }

    pub fn stop(&mut self) {
        debug!("[muse] stop");
        self.cues.borrow_mut().clear();
    }

    pub fn recent_cues(&self) -> Vec<String> {
        self.cues.borrow().iter().cloned().collect()
    }
}
