//! Whole-session integration tests on the scripted surface.
