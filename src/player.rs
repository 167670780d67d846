use rand::Rng;

// one entry in the queue the player is currently working through. this is
// whatever list the view last handed over (all songs, one playlist, search
// results) and is totally independent of persisted playlists
#[derive(Clone, Debug, PartialEq)]
pub struct QueueTrack {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub url: String,
}

// side effects for whoever owns the actual audio output. transitions stay
// pure and hand these back instead of touching the element themselves
#[derive(Clone, Debug, PartialEq)]
pub enum AudioCommand {
    Load { url: String },
    Play,
    Pause,
    Seek(f64),
    SetVolume(f32),
}

// single-active-track player state. current track is matched by id, not by
// index, because the queue can be swapped out between actions
pub struct Player {
    tracks: Vec<QueueTrack>,
    current: Option<String>,
    playing: bool,
    shuffle: bool,
    volume: f32,
    prev_volume: f32,
    muted: bool,
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            current: None,
            playing: false,
            shuffle: false,
            volume: 1.0,
            prev_volume: 1.0,
            muted: false,
        }
    }

    // swap in a new queue. the current pointer survives; if the track isn't
    // in the new list, advance/rewind just won't find it
    pub fn set_queue(&mut self, tracks: Vec<QueueTrack>) {
        self.tracks = tracks;
    }

    pub fn current(&self) -> Option<&QueueTrack> {
        let id = self.current.as_deref()?;
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    // point the player at a track and start it from zero
    pub fn load(&mut self, track: &QueueTrack) -> Vec<AudioCommand> {
        self.current = Some(track.id.clone());
        self.playing = true;
        vec![
            AudioCommand::Load {
                url: track.url.clone(),
            },
            AudioCommand::Play,
        ]
    }

    // only meaningful with a track loaded
    pub fn toggle_play(&mut self) -> Option<AudioCommand> {
        self.current.as_ref()?;
        self.playing = !self.playing;
        Some(if self.playing {
            AudioCommand::Play
        } else {
            AudioCommand::Pause
        })
    }

    pub fn toggle_shuffle(&mut self) {
        self.shuffle = !self.shuffle;
    }

    fn current_index(&self) -> Option<usize> {
        let id = self.current.as_deref()?;
        self.tracks.iter().position(|t| t.id == id)
    }

    // skip forward. list order with wraparound normally; uniform over the
    // other tracks when shuffle is on (a one-track list just replays)
    pub fn advance(&mut self) -> Vec<AudioCommand> {
        self.advance_with(|n| rand::thread_rng().gen_range(0..n))
    }

    // same transition with the random choice injected, so the shuffle path
    // is testable. pick gets the candidate count and returns an index into it
    pub fn advance_with(&mut self, pick: impl FnOnce(usize) -> usize) -> Vec<AudioCommand> {
        let Some(idx) = self.current_index() else {
            return Vec::new();
        };

        let next = if self.shuffle {
            let candidates: Vec<usize> =
                (0..self.tracks.len()).filter(|&i| i != idx).collect();
            if candidates.is_empty() {
                idx
            } else {
                candidates[pick(candidates.len())]
            }
        } else {
            (idx + 1) % self.tracks.len()
        };

        let track = self.tracks[next].clone();
        self.load(&track)
    }

    // previous track is always list order, wrapping. shuffle only affects
    // forward movement
    pub fn rewind(&mut self) -> Vec<AudioCommand> {
        let Some(idx) = self.current_index() else {
            return Vec::new();
        };

        let prev = (idx + self.tracks.len() - 1) % self.tracks.len();
        let track = self.tracks[prev].clone();
        self.load(&track)
    }

    // the media element ran out of audio. same selection as a manual skip
    pub fn ended(&mut self) -> Vec<AudioCommand> {
        self.advance()
    }

    // jump to an offset without touching the play/pause state
    pub fn seek(&mut self, position: f64) -> Option<AudioCommand> {
        self.current.as_ref()?;
        Some(AudioCommand::Seek(position))
    }

    pub fn set_volume(&mut self, volume: f32) -> AudioCommand {
        self.volume = volume.clamp(0.0, 1.0);
        if self.volume > 0.0 {
            self.muted = false;
        }
        AudioCommand::SetVolume(self.volume)
    }

    // mute stashes the level and restores it exactly on the way back
    pub fn toggle_mute(&mut self) -> AudioCommand {
        if self.muted {
            self.volume = self.prev_volume;
            self.muted = false;
        } else {
            self.prev_volume = self.volume;
            self.volume = 0.0;
            self.muted = true;
        }
        AudioCommand::SetVolume(self.volume)
    }
}
