//! Per-student write locks
//!
//! Orchestrations for the same student are serialized; different students
//! only share the brief registry critical section.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::domain::StudentId;

/// Registry of students with an orchestration in flight
#[derive(Debug, Default)]
pub struct StudentLocks {
    held: Mutex<HashSet<StudentId>>,
    released: Condvar,
}

/// Releases the student's lock on drop
#[derive(Debug)]
pub struct StudentLockGuard<'a> {
    locks: &'a StudentLocks,
    student: StudentId,
}

impl StudentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn held(&self) -> MutexGuard<'_, HashSet<StudentId>> {
        // The set is only touched by insert/remove, so a poisoned guard is still consistent
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait up to `wait` for exclusive access to `student`; None on timeout
    pub fn acquire(&self, student: &StudentId, wait: Duration) -> Option<StudentLockGuard<'_>> {
        let held = self.held();
        let (mut held, timeout) = self
            .released
            .wait_timeout_while(held, wait, |held| held.contains(student))
            .unwrap_or_else(PoisonError::into_inner);

        if timeout.timed_out() && held.contains(student) {
            return None;
        }

        held.insert(student.clone());
        Some(StudentLockGuard {
            locks: self,
            student: student.clone(),
        })
    }

    pub fn is_locked(&self, student: &StudentId) -> bool {
        self.held().contains(student)
    }
}

impl Drop for StudentLockGuard<'_> {
    fn drop(&mut self) {
        self.locks.held().remove(&self.student);
        self.locks.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_same_student_times_out_while_held() {
        let locks = StudentLocks::new();
        let student = StudentId::new("s1");
        let guard = locks.acquire(&student, Duration::from_millis(10)).unwrap();
        assert!(locks.is_locked(&student));
        assert!(locks.acquire(&student, Duration::from_millis(20)).is_none());
        drop(guard);
        assert!(!locks.is_locked(&student));
        assert!(locks.acquire(&student, Duration::from_millis(10)).is_some());
    }

    #[test]
    fn test_different_students_do_not_block() {
        let locks = StudentLocks::new();
        let _a = locks.acquire(&StudentId::new("a"), Duration::ZERO).unwrap();
        let _b = locks.acquire(&StudentId::new("b"), Duration::ZERO).unwrap();
    }

    #[test]
    fn test_waiters_are_serialized() {
        let locks = Arc::new(StudentLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    let student = StudentId::new("shared");
                    let _guard = locks.acquire(&student, Duration::from_secs(5)).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(2));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
