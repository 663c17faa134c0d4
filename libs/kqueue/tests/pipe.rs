// Copyright (c) 2022 Huawei Technologies Co.,Ltd. All rights reserved.
//
// sysMaster is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan
// PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//         http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY
// KIND, EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO
// NON-INFRINGEMENT, MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

#[cfg(test)]
mod test {
    use kqueue::{Error, FilterKind, Kqueue, Status};
    use nix::unistd::{close, pipe, write};
    use std::os::unix::io::RawFd;
    use std::rc::Rc;

    struct Pipe {
        r: RawFd,
        w: RawFd,
    }

    impl Pipe {
        fn new() -> Pipe {
            let (r, w) = pipe().unwrap();
            Pipe { r, w }
        }

        fn close_write(&mut self) {
            close(self.w).unwrap();
            self.w = -1;
        }
    }

    impl Drop for Pipe {
        fn drop(&mut self) {
            let _ = close(self.r);
            if self.w >= 0 {
                let _ = close(self.w);
            }
        }
    }

    fn new_kqueue() -> Rc<Kqueue<String>> {
        Kqueue::new().unwrap()
    }

    #[test]
    fn test_read_level() {
        let p = Pipe::new();
        let kq = new_kqueue();
        let ev = kq.new_event();
        ev.as_read(p.r, Some("reader".to_string())).unwrap();
        assert_eq!(kq.len(), 1);

        assert_eq!(kq.wait(50).unwrap(), 0);

        write(p.w, b"hello").unwrap();
        for _ in 0..2 {
            assert_eq!(kq.wait(1000).unwrap(), 1);
            let occ = kq.consume().unwrap().unwrap();
            assert!(Rc::ptr_eq(&occ.event, &ev));
            assert_eq!(occ.info.filter, FilterKind::Read.raw());
            assert_eq!(occ.info.data, 5);
            assert_eq!(occ.info.udata.as_deref(), Some("reader"));
            assert!(!occ.info.edge && !occ.info.oneshot && !occ.info.eof);
            assert!(kq.consume().unwrap().is_none());
        }

        assert_eq!(ev.unwatch().unwrap(), Status::Done);
        assert_eq!(kq.wait(-1).unwrap(), 0);
    }

    #[test]
    fn test_read_edge() {
        let p = Pipe::new();
        let kq = new_kqueue();
        let ev = kq.new_event();
        ev.as_edge().unwrap();
        ev.as_read(p.r, None).unwrap();

        write(p.w, b"x").unwrap();
        assert_eq!(kq.wait(1000).unwrap(), 1);
        assert!(kq.consume().unwrap().unwrap().info.edge);

        /* no new data, no new edge */
        assert_eq!(kq.wait(50).unwrap(), 0);

        write(p.w, b"y").unwrap();
        assert_eq!(kq.wait(1000).unwrap(), 1);
        assert!(ev.is_enabled());
    }

    #[test]
    fn test_write_oneshot() {
        let p = Pipe::new();
        let kq = new_kqueue();
        let ev = kq.new_event();
        ev.as_oneshot().unwrap();
        ev.as_write(p.w, Some("writer".to_string())).unwrap();

        assert_eq!(kq.wait(1000).unwrap(), 1);
        let occ = kq.consume().unwrap().unwrap();
        assert!(occ.info.oneshot);
        assert!(!ev.is_enabled());
        assert!(kq.is_empty());

        /* nothing is registered any more, wait returns at once */
        assert_eq!(kq.wait(-1).unwrap(), 0);
        assert_eq!(ev.unwatch().unwrap(), Status::Already);

        assert_eq!(ev.watch().unwrap(), Status::Done);
        assert_eq!(kq.len(), 1);
    }

    #[test]
    fn test_read_eof() {
        let mut p = Pipe::new();
        let kq = new_kqueue();
        let ev = kq.new_event();
        ev.as_read(p.r, None).unwrap();
        p.close_write();

        assert_eq!(kq.wait(1000).unwrap(), 1);
        let occ = kq.consume().unwrap().unwrap();
        assert!(occ.info.eof);
        assert!(ev.is_eof());
        assert!(!ev.is_enabled());
        assert!(kq.is_empty());
    }

    #[test]
    fn test_leftover_eof_is_unwatched() {
        let mut p = Pipe::new();
        let kq = new_kqueue();
        let ev = kq.new_event();
        ev.as_read(p.r, None).unwrap();
        p.close_write();

        assert_eq!(kq.wait(1000).unwrap(), 1);
        /* never consumed */
        assert_eq!(kq.wait(-1).unwrap(), 0);
        assert!(!ev.is_enabled());
    }

    #[test]
    fn test_same_fd_twice() {
        let p = Pipe::new();
        let kq = new_kqueue();
        let a = kq.new_event();
        let b = kq.new_event();
        a.as_read(p.r, None).unwrap();
        assert!(matches!(
            b.as_read(p.r, None),
            Err(Error::AlreadyRegistered)
        ));
        assert_eq!(kq.len(), 1);
    }

    #[test]
    fn test_bad_fd() {
        let kq = new_kqueue();
        let ev = kq.new_event();
        let err = ev.as_read(100_000, None).unwrap_err();
        assert_eq!(err.errno(), Some(libc::EBADF));
        assert!(kq.is_empty());
        assert_eq!(ev.filter(), None);
    }

    #[test]
    fn test_renew_between_kqueues() {
        let p = Pipe::new();
        let kq1 = new_kqueue();
        let kq2 = new_kqueue();
        let ev = kq1.new_event();
        ev.as_read(p.r, Some("moved".to_string())).unwrap();

        ev.renew(Some(kq2.clone())).unwrap();
        assert!(kq1.is_empty());
        assert_eq!(kq2.len(), 1);

        write(p.w, b"z").unwrap();
        assert_eq!(kq1.wait(50).unwrap(), 0);
        assert_eq!(kq2.wait(1000).unwrap(), 1);
        let occ = kq2.consume().unwrap().unwrap();
        assert_eq!(occ.info.udata.as_deref(), Some("moved"));
    }

    #[test]
    fn test_writer_close_reaches_reader() {
        let mut p = Pipe::new();
        let kq = new_kqueue();
        let writer = kq.new_event();
        let reader = kq.new_event();
        writer.as_edge().unwrap();
        writer.as_write(p.w, Some("writer".to_string())).unwrap();
        reader.as_read(p.r, Some("reader".to_string())).unwrap();

        assert_eq!(kq.wait(1000).unwrap(), 1);
        let occ = kq.consume().unwrap().unwrap();
        assert_eq!(occ.info.udata.as_deref(), Some("writer"));

        p.close_write();
        assert_eq!(kq.wait(1000).unwrap(), 1);
        let occ = kq.consume().unwrap().unwrap();
        assert!(Rc::ptr_eq(&occ.event, &reader));
        assert!(occ.info.eof);
        assert!(!reader.is_enabled());

        /* the closed writer's registration went with its fd */
        assert_eq!(writer.unwatch().unwrap(), Status::Done);
        assert!(kq.is_empty());
    }
}
